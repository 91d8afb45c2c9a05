use actix_web::{http::header::HeaderValue, HttpRequest};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::num::ParseIntError;

use crate::error::{LedgerError, LedgerResult};
use crate::schemas::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Header a bot caller uses to name the user it acts for.
pub const ACTING_USER_HEADER: &str = "X-Acting-User";

/// How long a signed Telegram login stays valid, in seconds.
pub const LOGIN_MAX_AGE_SECS: i64 = 24 * 60 * 60;
const CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, PartialEq)]
pub enum AuthorizationLevel {
    Bot,
    Frontend(UserId),
}

#[derive(Deserialize, Debug, Clone)]
struct TelegramAuthData {
    auth_date: String,
    first_name: Option<String>,
    last_name: Option<String>,
    id: String,
    photo_url: Option<String>,
    username: String,
    hash: String,
}

pub fn check_authorization_level(request: &HttpRequest, bot_token: &str) -> Option<AuthorizationLevel> {
    let authorization = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)?
        .ok()?;
    authorization_level(authorization, bot_token, Utc::now().timestamp())
}

fn authorization_level(authorization: &str, bot_token: &str, now: i64) -> Option<AuthorizationLevel> {
    if authorization == bot_token {
        return Some(AuthorizationLevel::Bot);
    }
    let auth_data: TelegramAuthData = serde_json::from_str(authorization).ok()?;
    if !is_fresh(&auth_data.auth_date, now) {
        tracing::debug!(auth_date = %auth_data.auth_date, "stale or malformed login rejected");
        return None;
    }
    let hash = decode_hex(&auth_data.hash).ok()?;
    let username = auth_data.username.clone();
    verify_hash(auth_data, bot_token, &hash).then_some(AuthorizationLevel::Frontend(username))
}

/// Resolves the user a request acts for. Bot callers must name the user in
/// [`ACTING_USER_HEADER`].
pub fn caller(request: &HttpRequest, bot_token: &str) -> LedgerResult<UserId> {
    match check_authorization_level(request, bot_token) {
        Some(AuthorizationLevel::Frontend(user)) => Ok(user),
        Some(AuthorizationLevel::Bot) => request
            .headers()
            .get(ACTING_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|user| !user.is_empty())
            .map(str::to_string)
            .ok_or(LedgerError::Unauthorized),
        None => Err(LedgerError::Unauthorized),
    }
}

pub fn require_bot(request: &HttpRequest, bot_token: &str) -> LedgerResult<()> {
    match check_authorization_level(request, bot_token) {
        Some(AuthorizationLevel::Bot) => Ok(()),
        Some(AuthorizationLevel::Frontend(_)) => Err(LedgerError::forbidden("bot access only")),
        None => Err(LedgerError::Unauthorized),
    }
}

// `auth_date` is the unix time Telegram signed the login at.
fn is_fresh(auth_date: &str, now: i64) -> bool {
    auth_date
        .parse::<i64>()
        .is_ok_and(|signed_at| {
            signed_at <= now + CLOCK_SKEW_SECS && now - signed_at <= LOGIN_MAX_AGE_SECS
        })
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, ParseIntError> {
    hex.chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|n| u8::from_str_radix(&String::from_iter(n), 16))
        .collect()
}

fn data_check_string(auth_data: TelegramAuthData) -> String {
    [
        ("auth_date", Some(auth_data.auth_date)),
        ("first_name", auth_data.first_name),
        ("id", Some(auth_data.id)),
        ("last_name", auth_data.last_name),
        ("photo_url", auth_data.photo_url),
        ("username", Some(auth_data.username)),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|val| format!("{key}={val}")))
    .collect::<Vec<_>>()
    .join("\n")
}

// The HMAC key is SHA256(bot token), as Telegram login widgets sign it.
fn signer(bot_token: &str, auth_data: TelegramAuthData) -> Option<HmacSha256> {
    let secret = Sha256::digest(bot_token.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&secret).ok()?;
    mac.update(data_check_string(auth_data).as_bytes());
    Some(mac)
}

fn verify_hash(auth_data: TelegramAuthData, bot_token: &str, hash: &[u8]) -> bool {
    signer(bot_token, auth_data).is_some_and(|mac| mac.verify_slice(hash).is_ok())
}
