//! End-to-end engine flow: sanitize → segment → deliver.

use std::sync::Mutex;
use std::time::Duration;

use divvy_core::{
    ChunkSender, MarkupOptions, SegmentOptions, SendOutcome, deliver, open_tags, sanitize, segment,
};

/// Records every attempt; optionally blocks at a given attempt index.
struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    block_at: Option<usize>,
}

impl RecordingTransport {
    fn new(block_at: Option<usize>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            block_at,
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock").clone()
    }
}

impl ChunkSender for RecordingTransport {
    async fn send_chunk(&self, content: &str) -> SendOutcome {
        let mut sent = self.sent.lock().expect("sent lock");
        let index = sent.len();
        sent.push(content.to_string());
        match self.block_at {
            Some(blocked_index) if blocked_index == index => SendOutcome::Blocked,
            _ => SendOutcome::Delivered,
        }
    }
}

fn long_report() -> String {
    let mut report = String::from("📊 <b>Portfolio Report</b><br><hr>");
    for index in 0..12 {
        report.push_str(&format!(
            "<b>SYM{index}</b><br>Yield: {index}.25%<br>Amount: $0.{index}<br><br>"
        ));
    }
    report.push_str(r#"<img src="chart.png" alt="allocation">"#);
    report
}

#[tokio::test]
async fn oversized_report_arrives_in_order_and_well_formed() {
    let max_length = 64;
    let sanitized = sanitize(&long_report());
    // Sanitizer boundary: non-text elements are already gone.
    assert!(!sanitized.contains("<br"));
    assert!(sanitized.contains("[Image: allocation]"));

    let chunks = segment(&sanitized, &SegmentOptions::with_max_length(max_length));
    assert!(chunks.len() > 1);

    let transport = RecordingTransport::new(None);
    let report = deliver(&chunks, &transport, Duration::ZERO).await;

    assert!(report.delivered_all());
    let sent = transport.sent();
    assert_eq!(sent.len(), chunks.len());

    let markup = MarkupOptions::default();
    for (index, content) in sent.iter().enumerate() {
        // The transport observed exactly what the segmenter produced.
        assert_eq!(content, &chunks[index].content);
        assert!(content.chars().count() <= max_length);
        assert!(open_tags(content, &markup).is_empty(), "unbalanced: {content:?}");
    }
}

#[tokio::test]
async fn blocked_recipient_stops_the_report_mid_way() {
    let sanitized = sanitize(&long_report());
    let chunks = segment(&sanitized, &SegmentOptions::with_max_length(64));
    assert!(chunks.len() > 2);

    let transport = RecordingTransport::new(Some(1));
    let report = deliver(&chunks, &transport, Duration::ZERO).await;

    assert!(report.blocked);
    assert_eq!(report.attempted(), 2);
    assert_eq!(transport.sent().len(), 2);
}
