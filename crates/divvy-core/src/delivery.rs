//! Sequential delivery of segmented chunks.
//!
//! Chunks go out strictly in list order, one in flight at a time, with a
//! pacing delay between sends. A soft transport failure loses that chunk
//! but not the rest; a permanent block aborts the remainder and is
//! surfaced to the caller, who owns any follow-up (e.g. deactivating the
//! recipient). No chunk is ever retried.

use std::time::Duration;

use tracing::warn;

use crate::segment::Chunk;

/// Transport classification of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The recipient is permanently unreachable (e.g. blocked the bot).
    Blocked,
    /// Transient or unclassified transport failure.
    Failed(String),
}

/// One send attempt per chunk, classified for the pipeline.
///
/// Implementations must not retry internally; the pipeline guarantees
/// at-most-one attempt per chunk.
pub trait ChunkSender {
    fn send_chunk(&self, content: &str) -> impl Future<Output = SendOutcome> + Send;
}

/// Per-chunk result, index-aligned with the chunk list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub delivered: bool,
    pub blocked: bool,
    pub error: Option<String>,
}

/// Outcome of one delivery call.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    /// Outcomes for attempted chunks only; shorter than `chunks_total`
    /// when a permanent block aborted the remainder.
    pub outcomes: Vec<ChunkOutcome>,
    /// True when delivery aborted because the recipient is gone for good.
    pub blocked: bool,
    pub chunks_total: usize,
}

impl DeliveryReport {
    pub fn delivered_all(&self) -> bool {
        self.outcomes.len() == self.chunks_total
            && self.outcomes.iter().all(|outcome| outcome.delivered)
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

/// Sends `chunks` in order through `sender`.
///
/// Suspends only on the send itself and on the inter-chunk pacing delay;
/// there is never more than one send in flight.
pub async fn deliver<S: ChunkSender>(
    chunks: &[Chunk],
    sender: &S,
    inter_chunk_delay: Duration,
) -> DeliveryReport {
    let mut report = DeliveryReport {
        outcomes: Vec::with_capacity(chunks.len()),
        blocked: false,
        chunks_total: chunks.len(),
    };

    for (index, chunk) in chunks.iter().enumerate() {
        match sender.send_chunk(&chunk.content).await {
            SendOutcome::Delivered => {
                report.outcomes.push(ChunkOutcome {
                    delivered: true,
                    blocked: false,
                    error: None,
                });
            }
            SendOutcome::Blocked => {
                warn!(
                    chunk = index + 1,
                    total = chunks.len(),
                    "recipient blocked delivery, aborting remaining chunks"
                );
                report.outcomes.push(ChunkOutcome {
                    delivered: false,
                    blocked: true,
                    error: None,
                });
                report.blocked = true;
                break;
            }
            SendOutcome::Failed(reason) => {
                // Best effort: one lost chunk does not doom the rest.
                warn!(
                    chunk = index + 1,
                    total = chunks.len(),
                    error = %reason,
                    "chunk delivery failed, continuing"
                );
                report.outcomes.push(ChunkOutcome {
                    delivered: false,
                    blocked: false,
                    error: Some(reason),
                });
            }
        }

        if index + 1 < chunks.len() && !inter_chunk_delay.is_zero() {
            tokio::time::sleep(inter_chunk_delay).await;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::{ChunkSender, SendOutcome, deliver};
    use crate::segment::Chunk;

    /// Plays back a script of outcomes and records every attempt.
    struct ScriptedSender {
        script: Vec<SendOutcome>,
        attempts: Mutex<Vec<String>>,
    }

    impl ScriptedSender {
        fn new(script: Vec<SendOutcome>) -> Self {
            Self {
                script,
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().expect("attempts lock").clone()
        }
    }

    impl ChunkSender for ScriptedSender {
        async fn send_chunk(&self, content: &str) -> SendOutcome {
            let mut attempts = self.attempts.lock().expect("attempts lock");
            let outcome = self.script[attempts.len()].clone();
            attempts.push(content.to_string());
            outcome
        }
    }

    fn chunks(contents: &[&str]) -> Vec<Chunk> {
        contents
            .iter()
            .map(|content| Chunk {
                content: (*content).to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn delivers_all_chunks_in_order() {
        let sender = ScriptedSender::new(vec![
            SendOutcome::Delivered,
            SendOutcome::Delivered,
            SendOutcome::Delivered,
        ]);
        let report = deliver(&chunks(&["one", "two", "three"]), &sender, Duration::ZERO).await;

        assert!(report.delivered_all());
        assert!(!report.blocked);
        assert_eq!(sender.attempts(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn soft_failure_continues_with_the_remainder() {
        let sender = ScriptedSender::new(vec![
            SendOutcome::Delivered,
            SendOutcome::Failed("flood control".to_string()),
            SendOutcome::Delivered,
        ]);
        let report = deliver(&chunks(&["a", "b", "c"]), &sender, Duration::ZERO).await;

        assert!(!report.delivered_all());
        assert!(!report.blocked);
        assert_eq!(report.attempted(), 3);
        assert!(report.outcomes[0].delivered);
        assert!(!report.outcomes[1].delivered);
        assert_eq!(report.outcomes[1].error.as_deref(), Some("flood control"));
        assert!(report.outcomes[2].delivered);
    }

    #[tokio::test]
    async fn permanent_block_aborts_remaining_chunks() {
        let sender = ScriptedSender::new(vec![SendOutcome::Delivered, SendOutcome::Blocked]);
        let report = deliver(&chunks(&["a", "b", "c"]), &sender, Duration::ZERO).await;

        assert!(report.blocked);
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.chunks_total, 3);
        assert!(report.outcomes[1].blocked);
        // The third chunk was never attempted.
        assert_eq!(sender.attempts(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn empty_chunk_list_is_a_clean_no_op() {
        let sender = ScriptedSender::new(Vec::new());
        let report = deliver(&[], &sender, Duration::from_millis(500)).await;

        assert!(report.delivered_all());
        assert_eq!(report.attempted(), 0);
        assert!(sender.attempts().is_empty());
    }
}
