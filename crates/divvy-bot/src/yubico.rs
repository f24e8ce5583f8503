//! YubiKey OTP verification against the Yubico validation service.
//!
//! Requests are signed with HMAC-SHA1 over the sorted query parameters,
//! and the response signature is checked the same way, in constant time.
//! The protocol fixes the digest; SHA-1 here authenticates an API
//! response, it is not used for anything collision-sensitive.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::config::Config;

pub(crate) const YUBIKEY_ID_LENGTH: usize = 12;
pub(crate) const YUBIKEY_OTP_LENGTH: usize = 44;

const VERIFY_URL: &str = "https://api.yubico.com/wsapi/2.0/verify";

type HmacSha1 = Hmac<Sha1>;

/// Validation service credentials, resolved once at startup.
#[derive(Debug, Clone)]
pub(crate) struct YubicoSettings {
    pub client_id: String,
    pub secret_key: String,
}

impl YubicoSettings {
    /// Config values with env overrides; `None` disables /login.
    pub(crate) fn from_config(config: &Config) -> Option<Self> {
        let client_id = non_empty(config.yubico.client_id.as_deref())
            .or_else(|| non_empty_env("DIVVY_YUBICO_CLIENT_ID"))?;
        let secret_key = non_empty(config.yubico.secret_key.as_deref())
            .or_else(|| non_empty_env("DIVVY_YUBICO_SECRET_KEY"))?;
        Some(Self {
            client_id,
            secret_key,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// The stable public ID prefix identifying the physical key.
pub(crate) fn yubikey_id(otp: &str) -> String {
    otp.chars()
        .take(YUBIKEY_ID_LENGTH)
        .collect::<String>()
        .to_lowercase()
}

/// Verifies an OTP with the Yubico service. `Ok(false)` is a rejected or
/// tampered response; `Err` means the service could not be consulted.
pub(crate) async fn verify_otp(
    http: &reqwest::Client,
    otp: &str,
    settings: &YubicoSettings,
) -> Result<bool> {
    let nonce = uuid::Uuid::new_v4().simple().to_string();

    let mut params = BTreeMap::new();
    params.insert("id".to_string(), settings.client_id.clone());
    params.insert("otp".to_string(), otp.to_string());
    params.insert("nonce".to_string(), nonce.clone());
    let signature = sign_params(&params, &settings.secret_key)?;
    params.insert("h".to_string(), signature);

    let response = http
        .get(VERIFY_URL)
        .query(&params)
        .send()
        .await
        .context("Yubico request failed")?;
    if !response.status().is_success() {
        return Ok(false);
    }
    let body = response
        .text()
        .await
        .context("Failed to read Yubico response")?;

    validate_response(&body, otp, &nonce, &settings.secret_key)
}

/// HMAC-SHA1 over `key1=value1&key2=value2...` in sorted key order.
fn sign_params(params: &BTreeMap<String, String>, secret_key_b64: &str) -> Result<String> {
    let key = BASE64
        .decode(secret_key_b64)
        .context("Invalid Yubico secret key")?;
    let message = params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut mac =
        HmacSha1::new_from_slice(&key).map_err(|_| anyhow!("HMAC-SHA1 key init failed"))?;
    mac.update(message.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn parse_response(body: &str) -> BTreeMap<String, String> {
    body.trim()
        .lines()
        .filter_map(|line| {
            let (name, value) = line.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Accepts only an `OK` status echoing our nonce and OTP, carrying a
/// signature that matches under our shared secret.
fn validate_response(body: &str, otp: &str, nonce: &str, secret_key_b64: &str) -> Result<bool> {
    let mut params = parse_response(body);
    let Some(received_signature) = params.remove("h") else {
        return Ok(false);
    };

    if params.get("status").map(String::as_str) != Some("OK")
        || params.get("nonce").map(String::as_str) != Some(nonce)
        || params.get("otp").map(String::as_str) != Some(otp)
    {
        return Ok(false);
    }

    let expected_signature = sign_params(&params, secret_key_b64)?;
    Ok(constant_time_eq(
        received_signature.as_bytes(),
        expected_signature.as_bytes(),
    ))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut mismatch = 0u8;
    for (x, y) in a.iter().zip(b) {
        mismatch |= x ^ y;
    }
    mismatch == 0
}
