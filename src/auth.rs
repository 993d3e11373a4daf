use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::util::write_json_pretty;

const EXPIRY_SKEW_SECONDS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub expiry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub fn access_token(http: &reqwest::blocking::Client, token_path: &Path) -> Result<String> {
    let mut token = read_token(token_path)?;

    if let Some(access) = token.access_token.clone() {
        if is_fresh(token.expiry.as_deref(), Utc::now()) {
            debug!("cached access token still valid");
            return Ok(access);
        }
    }

    refresh(http, token_path, &mut token)
}

fn read_token(path: &Path) -> Result<StoredToken> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read token file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse token file: {}", path.display()))
}

fn is_fresh(expiry: Option<&str>, now: DateTime<Utc>) -> bool {
    let Some(expiry) = expiry else {
        return false;
    };
    match DateTime::parse_from_rfc3339(expiry) {
        Ok(parsed) => {
            parsed.with_timezone(&Utc) - now > Duration::seconds(EXPIRY_SKEW_SECONDS)
        }
        Err(_) => false,
    }
}

fn refresh(
    http: &reqwest::blocking::Client,
    token_path: &Path,
    token: &mut StoredToken,
) -> Result<String> {
    let refresh_token = token
        .refresh_token
        .as_deref()
        .context("token file has no refresh_token; run the authorization flow again")?;
    let client_id = token
        .client_id
        .as_deref()
        .context("token file has no client_id")?;
    let client_secret = token
        .client_secret
        .as_deref()
        .context("token file has no client_secret")?;

    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];

    let response = http
        .post(&token.token_uri)
        .form(&params)
        .send()
        .with_context(|| format!("token refresh request to {} failed", token.token_uri))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        bail!("token refresh rejected ({status}): {body}");
    }

    let refreshed: RefreshResponse = response
        .json()
        .context("failed to parse token refresh response")?;

    token.access_token = Some(refreshed.access_token.clone());
    token.expiry = refreshed.expires_in.map(|seconds| {
        (Utc::now() + Duration::seconds(seconds)).to_rfc3339_opts(SecondsFormat::Secs, true)
    });
    write_json_pretty(token_path, &*token)?;
    info!(path = %token_path.display(), "refreshed access token");

    Ok(refreshed.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_with_future_expiry_is_fresh() {
        let now = Utc::now();
        let expiry = (now + Duration::hours(1)).to_rfc3339();
        assert!(is_fresh(Some(&expiry), now));
    }

    #[test]
    fn token_inside_the_skew_window_needs_refresh() {
        let now = Utc::now();
        let expiry = (now + Duration::seconds(30)).to_rfc3339();
        assert!(!is_fresh(Some(&expiry), now));
    }

    #[test]
    fn expired_missing_or_garbled_expiry_needs_refresh() {
        let now = Utc::now();
        let past = (now - Duration::hours(1)).to_rfc3339();
        assert!(!is_fresh(Some(&past), now));
        assert!(!is_fresh(None, now));
        assert!(!is_fresh(Some("next tuesday"), now));
    }

    #[test]
    fn minimal_token_file_parses_with_defaults() {
        let raw = r#"{"refresh_token": "r", "client_id": "c", "client_secret": "s"}"#;
        let token: StoredToken = serde_json::from_str(raw).expect("token should parse");
        assert_eq!(token.refresh_token.as_deref(), Some("r"));
        assert!(token.access_token.is_none());
        assert!(token.expiry.is_none());
        assert_eq!(token.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn full_token_file_round_trips() {
        let raw = r#"{
            "access_token": "a",
            "refresh_token": "r",
            "client_id": "c",
            "client_secret": "s",
            "token_uri": "https://auth.example.com/token",
            "expiry": "2024-06-01T12:00:00Z"
        }"#;
        let token: StoredToken = serde_json::from_str(raw).expect("token should parse");
        assert_eq!(token.access_token.as_deref(), Some("a"));
        assert_eq!(token.token_uri, "https://auth.example.com/token");

        let rendered = serde_json::to_string(&token).expect("token should serialize");
        let reparsed: StoredToken = serde_json::from_str(&rendered).expect("round trip");
        assert_eq!(reparsed.expiry.as_deref(), Some("2024-06-01T12:00:00Z"));
    }
}
