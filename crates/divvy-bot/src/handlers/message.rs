use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::bot::BotContext;
use crate::commands::{self, BotCommand};
use crate::dashboard::WatchlistError;
use crate::format;
use crate::telegram::Message;
use crate::yubico::{self, YUBIKEY_OTP_LENGTH};

pub(crate) async fn handle_message(context: &BotContext, message: Message) -> Result<()> {
    if !message.chat.is_private() {
        debug!(chat_id = message.chat.id, "ignoring non-DM chat");
        return Ok(());
    }
    let chat_id = message.chat.id;
    let Some(user) = message.from.as_ref() else {
        debug!(chat_id, "ignoring message without sender");
        return Ok(());
    };
    if user.is_bot {
        return Ok(());
    }
    let Some(text) = message.text.as_deref() else {
        return Ok(());
    };
    // Plain text and unknown commands are silently ignored.
    let Some((command, args)) = commands::parse_command(text) else {
        return Ok(());
    };

    info!(chat_id, user_id = user.id, ?command, "handling command");

    match command {
        BotCommand::Start => handle_start(context, chat_id).await,
        BotCommand::Stop => handle_stop(context, chat_id).await,
        BotCommand::Login => handle_login(context, chat_id, &args).await,
        BotCommand::Logout => handle_logout(context, chat_id).await,
        BotCommand::Watchlist => handle_watchlist(context, chat_id).await,
    }
}

/// Replies through the chunked delivery engine. Delivery problems are
/// logged, not propagated: a failed reply must not poison the update loop.
async fn send_reply(context: &BotContext, chat_id: i64, text: &str) {
    let report = context.client().send_html(chat_id, text).await;
    if report.blocked {
        warn!(chat_id, "recipient has blocked the bot");
    } else if !report.delivered_all() {
        warn!(
            chat_id,
            attempted = report.attempted(),
            total = report.chunks_total,
            "reply delivered partially"
        );
    }
}

async fn handle_start(context: &BotContext, chat_id: i64) -> Result<()> {
    let linked = {
        let store = context.store().lock().await;
        store.set_active(chat_id, true)?;
        store
            .get(chat_id)?
            .and_then(|subscriber| subscriber.user_id)
            .is_some()
    };

    let message = if linked {
        "👋 Welcome back! You are already logged in and subscribed to dividend alerts.\n\n\
         Use /watchlist to view your tracked symbols."
            .to_string()
    } else {
        format!(
            "👋 Welcome! You are now subscribed to dividend alerts.\n\n\
             Please register your YubiKey <a href='{}'>here</a> if you haven't already.\n\n\
             To link your Trader Dashboard account, touch your YubiKey and reply with:\n\
             <code>/login &lt;OTP&gt;</code>",
            context.config().dashboard_signup_url
        )
    };
    send_reply(context, chat_id, &message).await;
    Ok(())
}

async fn handle_stop(context: &BotContext, chat_id: i64) -> Result<()> {
    context.store().lock().await.set_active(chat_id, false)?;
    send_reply(context, chat_id, "🔕 You have been unsubscribed from alerts.").await;
    Ok(())
}

async fn handle_login(context: &BotContext, chat_id: i64, args: &[&str]) -> Result<()> {
    let [otp] = args else {
        send_reply(
            context,
            chat_id,
            "⚠️ Usage: <code>/login &lt;YubiKey OTP&gt;</code>",
        )
        .await;
        return Ok(());
    };
    if otp.chars().count() != YUBIKEY_OTP_LENGTH {
        send_reply(
            context,
            chat_id,
            "⚠️ Invalid OTP length. A YubiKey OTP must be exactly 44 characters long.",
        )
        .await;
        return Ok(());
    }
    let Some(settings) = context.yubico() else {
        warn!("yubico credentials not configured, rejecting /login");
        send_reply(context, chat_id, "⚠️ Authentication service unavailable.").await;
        return Ok(());
    };

    let yubikey_id = yubico::yubikey_id(otp);

    match yubico::verify_otp(context.http(), otp, settings).await {
        Ok(false) => {
            send_reply(context, chat_id, "❌ Invalid OTP. Please try again.").await;
        }
        Ok(true) => {
            if !context.dashboard().layout_exists(&yubikey_id) {
                send_reply(
                    context,
                    chat_id,
                    "🚫 Unauthorized Device ID. You must set up your Trader Dashboard \
                     before using this bot.",
                )
                .await;
                return Ok(());
            }

            let previous = {
                let store = context.store().lock().await;
                let previous = store.get(chat_id)?.and_then(|subscriber| subscriber.user_id);
                if previous.as_deref() != Some(yubikey_id.as_str()) {
                    store.link_user(chat_id, &yubikey_id)?;
                }
                previous
            };

            let reply = match previous {
                Some(existing) if existing == yubikey_id => {
                    "✅ You are already authenticated with this YubiKey. No changes were made."
                        .to_string()
                }
                Some(existing) => format!(
                    "✅ Successfully authenticated! Your old YubiKey account ({existing}) \
                     has been overwritten with the new one."
                ),
                None => "✅ Successfully authenticated and linked your account! \
                         Use /watchlist to view your tracked symbols."
                    .to_string(),
            };
            send_reply(context, chat_id, &reply).await;
        }
        Err(err) => {
            warn!(error = %err, "authentication service error");
            send_reply(context, chat_id, "⚠️ Authentication service unavailable.").await;
        }
    }
    Ok(())
}

async fn handle_logout(context: &BotContext, chat_id: i64) -> Result<()> {
    let was_linked = context.store().lock().await.unlink_user(chat_id)?;
    let reply = if was_linked {
        "🔓 Logged out. Your account has been unlinked."
    } else {
        "⚠️ You are not currently logged in."
    };
    send_reply(context, chat_id, reply).await;
    Ok(())
}

async fn handle_watchlist(context: &BotContext, chat_id: i64) -> Result<()> {
    let user_id = context
        .store()
        .lock()
        .await
        .get(chat_id)?
        .and_then(|subscriber| subscriber.user_id);
    let Some(user_id) = user_id else {
        send_reply(context, chat_id, WatchlistError::NotLoggedIn.user_message()).await;
        return Ok(());
    };

    let symbols = match context.dashboard().user_symbols(&user_id) {
        Ok(symbols) => symbols,
        Err(code) => {
            send_reply(context, chat_id, code.user_message()).await;
            return Ok(());
        }
    };

    let results = context.dashboard().fundamentals_for(&symbols)?;
    let today = format::ny_date_string(Utc::now());
    let message = format::watchlist_message(&symbols, &results, &today);
    send_reply(context, chat_id, &message).await;
    Ok(())
}
