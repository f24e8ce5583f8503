//! Divvy: a Telegram dividend-watchlist bot.
//!
//! The interesting part lives in `divvy-core`: every outbound message runs
//! through the markup-safe chunked delivery engine. This crate is the
//! hosting application — config, Telegram long polling, command handlers,
//! the subscriber store and the daily digest broadcast.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use divvy_core::SegmentOptions;
use tracing::{info, warn};

use crate::bot::BotContext;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::store::SubscriberStore;
use crate::telegram::{TelegramClient, TelegramSettings};
use crate::yubico::YubicoSettings;

mod bot;
mod commands;
mod config;
mod dashboard;
mod digest;
mod format;
mod handlers;
mod store;
mod telegram;
mod yubico;

pub async fn run() -> Result<()> {
    init_tracing();

    let config = Config::load().context("Failed to load divvy config")?;
    let settings = TelegramSettings::from_config(&config)?;
    let config_path = config::paths::config_path();
    if config_path.exists() {
        info!(path = %config_path.display(), "loaded config file");
    }
    run_bot(config, settings).await
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_bot(config: Config, settings: TelegramSettings) -> Result<()> {
    let client = TelegramClient::new(
        settings.bot_token,
        SegmentOptions::with_max_length(config.delivery.max_length),
        config.delivery.inter_chunk_delay(),
    );
    let yubico = YubicoSettings::from_config(&config);
    if yubico.is_none() {
        warn!("yubico credentials not configured; /login is disabled");
    }

    let context = Arc::new(BotContext::new(
        client,
        config,
        SubscriberStore::open_default(),
        Dashboard::open_default(),
        yubico,
    ));

    if let Err(err) = context
        .client()
        .set_my_commands(&commands::telegram_command_specs())
        .await
    {
        warn!(error = %err, "failed to register bot commands");
    }

    let digest_context = Arc::clone(&context);
    let digest_task = tokio::spawn(async move {
        digest::run_digest_loop(digest_context).await;
    });

    let mut offset: Option<i64> = None;
    let poll_timeout = Duration::from_secs(30);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("divvy-bot started, polling for updates");

    loop {
        let current_offset = offset;
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            updates = context.client().get_updates(current_offset, poll_timeout) => {
                let updates = match updates {
                    Ok(updates) => updates,
                    Err(err) => {
                        warn!(error = %err, "telegram polling error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(message) = update.message
                        && let Err(err) = handlers::message::handle_message(&context, message).await
                    {
                        warn!(error = %err, "message handling error");
                    }
                }
            }
        }
    }

    digest_task.abort();
    Ok(())
}
