//! Daily dividend digest broadcast.
//!
//! The original deployment fired this from an external cron trigger; here
//! a tokio interval checks whether the configured UTC hour has passed and
//! runs the broadcast once per day. Every message goes through the chunked
//! delivery engine; a permanent-block report deactivates that subscriber.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::bot::BotContext;
use crate::dashboard::DividendEvent;
use crate::format;

pub(crate) async fn run_digest_loop(context: Arc<BotContext>) {
    let mut interval = tokio::time::interval(context.config().digest.poll_interval());
    let mut last_run: Option<NaiveDate> = None;

    loop {
        interval.tick().await;

        let now = Utc::now();
        let today = now.date_naive();
        if now.hour() < context.config().digest.hour_utc || last_run == Some(today) {
            continue;
        }

        match broadcast_digest(&context).await {
            Ok(recipients) => {
                if recipients > 0 {
                    info!(recipients, "digest broadcast complete");
                }
            }
            Err(err) => warn!(error = %err, "digest broadcast failed"),
        }
        last_run = Some(today);
    }
}

/// Sends today's dividend events to every active subscriber tracking an
/// affected symbol. Returns how many recipients got a digest.
async fn broadcast_digest(context: &BotContext) -> Result<usize> {
    let subscribers = context.store().lock().await.active_subscribers()?;
    if subscribers.is_empty() {
        return Ok(0);
    }

    // Resolve watchlists up front; a broken layout costs its owner the
    // digest, never the whole broadcast.
    let mut watchlists: Vec<(i64, Vec<String>)> = Vec::new();
    for (chat_id, subscriber) in subscribers {
        let Some(user_id) = subscriber.user_id else {
            continue;
        };
        match context.dashboard().user_symbols(&user_id) {
            Ok(symbols) => watchlists.push((chat_id, symbols)),
            Err(err) => debug!(chat_id, ?err, "skipping subscriber without a usable watchlist"),
        }
    }
    if watchlists.is_empty() {
        return Ok(0);
    }

    let mut seen = HashSet::new();
    let unique_symbols: Vec<String> = watchlists
        .iter()
        .flat_map(|(_, symbols)| symbols.iter())
        .filter(|symbol| seen.insert((*symbol).clone()))
        .cloned()
        .collect();

    let today = format::ny_date_string(Utc::now());
    let events = context
        .dashboard()
        .today_dividend_events(&unique_symbols, &today)?;
    if events.is_empty() {
        return Ok(0);
    }

    let by_symbol: HashMap<&str, &DividendEvent> = events
        .iter()
        .map(|event| (event.symbol.as_str(), event))
        .collect();

    let broadcast_delay = context.config().delivery.broadcast_delay();
    let mut recipients = 0usize;

    for (chat_id, symbols) in watchlists {
        let user_events: Vec<DividendEvent> = symbols
            .iter()
            .filter_map(|symbol| by_symbol.get(symbol.as_str()))
            .map(|event| (*event).clone())
            .collect();
        if user_events.is_empty() {
            continue;
        }

        let message = format::digest_message(&user_events);
        let report = context.client().send_html(chat_id, &message).await;
        recipients += 1;

        if report.blocked {
            info!(chat_id, "recipient blocked the bot, deactivating");
            if let Err(err) = context.store().lock().await.set_active(chat_id, false) {
                warn!(chat_id, error = %err, "failed to deactivate blocked recipient");
            }
        } else if !report.delivered_all() {
            warn!(
                chat_id,
                attempted = report.attempted(),
                total = report.chunks_total,
                "digest delivered partially"
            );
        }

        if !broadcast_delay.is_zero() {
            tokio::time::sleep(broadcast_delay).await;
        }
    }

    Ok(recipients)
}
