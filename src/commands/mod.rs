use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::auth;
use crate::fetch::SearchConsoleClient;

pub mod audit;
pub mod properties;

pub(crate) fn search_console_client(token_path: &Path) -> Result<SearchConsoleClient> {
    let http = reqwest::blocking::Client::builder()
        .user_agent(concat!("gsc-audit/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .build()
        .context("failed to build http client")?;
    let access_token = auth::access_token(&http, token_path)?;
    Ok(SearchConsoleClient::new(http, access_token))
}
