//! Shared request plumbing for the REST clients.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("building HTTP client")
}

/// Appends `segments` to `base`'s path. Each segment is percent-encoded on
/// its own, so a `/`, `?` or `..` inside one cannot reach another endpoint.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("{base} cannot be used as an API base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Sends `request` and decodes a JSON body, turning non-2xx answers into
/// errors that carry the status and whatever the server said.
pub(crate) async fn send_json(request: RequestBuilder, what: &str) -> Result<Value> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{what}: request failed"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("{what}: reading response"))?;

    if status == StatusCode::TOO_MANY_REQUESTS {
        bail!("{what}: rate limit exceeded ({status}): {body}");
    }
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&body)
            .map(|json| json.to_string())
            .unwrap_or(body);
        bail!("{what}: {status}: {detail}");
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).with_context(|| format!("{what}: response is not JSON"))
}
