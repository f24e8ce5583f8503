use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use divvy_core::{ChunkSender, DeliveryReport, SegmentOptions, SendOutcome, deliver, sanitize, segment};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::commands::TelegramCommandSpec;
use crate::config::Config;

mod types;

pub(crate) use types::{Message, Update};

pub(crate) struct TelegramSettings {
    pub bot_token: String,
}

impl TelegramSettings {
    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .telegram
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var("DIVVY_TELEGRAM_BOT_TOKEN")
                    .ok()
                    .map(|token| token.trim().to_string())
                    .filter(|token| !token.is_empty())
            })
            .unwrap_or_default();
        if token.is_empty() {
            bail!("telegram.bot_token or DIVVY_TELEGRAM_BOT_TOKEN is required");
        }

        Ok(Self { bot_token: token })
    }
}

#[derive(Clone)]
pub(crate) struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    segment_options: SegmentOptions,
    inter_chunk_delay: Duration,
}

const TELEGRAM_PARSE_MODE: &str = "HTML";

impl TelegramClient {
    pub(crate) fn new(
        token: String,
        segment_options: SegmentOptions,
        inter_chunk_delay: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.telegram.org".to_string(),
            token,
            segment_options,
            inter_chunk_delay,
        }
    }

    pub(crate) async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: Some(vec!["message"]),
        };
        self.post("getUpdates", &request).await
    }

    pub(crate) async fn set_my_commands(&self, specs: &[TelegramCommandSpec]) -> Result<()> {
        let commands: Vec<BotCommandEntry> = specs
            .iter()
            .map(|spec| BotCommandEntry {
                command: spec.command,
                description: spec.description,
            })
            .collect();
        let _: bool = self
            .post("setMyCommands", &SetMyCommandsRequest { commands })
            .await?;
        Ok(())
    }

    /// Sends one marked-up message, chunking as needed.
    ///
    /// The engine path: sanitize, segment against the transport limit,
    /// deliver the chunks strictly in order with the configured pacing.
    /// A blocked report means the recipient is permanently unreachable;
    /// the caller decides what to do about it.
    pub(crate) async fn send_html(&self, chat_id: i64, text: &str) -> DeliveryReport {
        let sanitized = sanitize(text);
        let chunks = segment(&sanitized, &self.segment_options);
        let sender = RecipientSender {
            client: self,
            chat_id,
        };
        deliver(&chunks, &sender, self.inter_chunk_delay).await
    }

    /// One transport attempt for one chunk, classified for the pipeline.
    /// 403 is the only status mapped to a permanent block.
    async fn send_chunk(&self, chat_id: i64, content: &str) -> SendOutcome {
        let request = SendMessageRequest {
            chat_id,
            text: content,
            parse_mode: Some(TELEGRAM_PARSE_MODE),
        };
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let response = match self.http.post(url).json(&request).send().await {
            Ok(response) => response,
            Err(err) => return SendOutcome::Failed(format!("Telegram request failed: {err}")),
        };

        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return SendOutcome::Blocked;
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return SendOutcome::Failed(format!("Telegram status {status}: {body}"));
        }

        match response.json::<TelegramResponse<Message>>().await {
            Ok(payload) if payload.ok => SendOutcome::Delivered,
            Ok(payload) => SendOutcome::Failed(
                payload
                    .description
                    .unwrap_or_else(|| "Telegram API error".to_string()),
            ),
            Err(_) => SendOutcome::Failed("Failed to decode Telegram response".to_string()),
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, method: &str, body: &B) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|_| anyhow!("Telegram request failed"))?;

        let payload: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|_| anyhow!("Failed to decode Telegram response"))?;

        if !payload.ok {
            let description = payload
                .description
                .unwrap_or_else(|| "Telegram API error".to_string());
            bail!("{}", description);
        }

        payload
            .result
            .ok_or_else(|| anyhow!("Telegram response missing result"))
    }
}

/// Binds the pipeline's per-chunk send to one recipient.
struct RecipientSender<'a> {
    client: &'a TelegramClient,
    chat_id: i64,
}

impl ChunkSender for RecipientSender<'_> {
    async fn send_chunk(&self, content: &str) -> SendOutcome {
        self.client.send_chunk(self.chat_id, content).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct TelegramResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_updates: Option<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SetMyCommandsRequest<'a> {
    commands: Vec<BotCommandEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct BotCommandEntry<'a> {
    command: &'a str,
    description: &'a str,
}
