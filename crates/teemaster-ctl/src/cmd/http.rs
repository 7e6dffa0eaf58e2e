//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_URL: &str = "http://127.0.0.1:8283";

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub async fn get_json<R>(url: &str) -> Result<R>
where
    R: for<'de> Deserialize<'de>,
{
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to teemasterd at {url}, is it running?"))?;
    decode(resp).await
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    let resp = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("failed to connect to teemasterd at {url}, is it running?"))?;
    decode(resp).await
}

/// Parse a success body, or turn the server's `{"error"}` body into an error.
async fn decode<R>(resp: reqwest::Response) -> Result<R>
where
    R: for<'de> Deserialize<'de>,
{
    let status = resp.status();
    if !status.is_success() {
        let message = resp
            .json::<ErrorBody>()
            .await
            .map(|b| b.error)
            .unwrap_or_else(|_| "no details".to_string());
        bail!("{status}: {message}");
    }
    resp.json::<R>().await.context("failed to parse response")
}
