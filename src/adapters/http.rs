use std::time::Duration;

use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::domain::enrollment::UpstreamError;

const USER_AGENT: &str = concat!("enrollment-server/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for all collaborators.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Joins a base URL and a path without doubling or dropping the slash.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// POSTs `body` as JSON and decodes a JSON answer, treating non-2xx statuses as rejections.
pub(crate) async fn post_json<Req, Resp>(
    client: &Client,
    service: &'static str,
    url: &str,
    body: &Req,
) -> Result<Resp, UpstreamError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    debug!(service, url, "Sending request");
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|source| UpstreamError::Http { service, source })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| UpstreamError::Http { service, source })?;

    if !status.is_success() {
        return Err(UpstreamError::Rejected {
            service,
            message: format!("HTTP {status}: {}", truncate(&text)),
        });
    }

    serde_json::from_str(&text).map_err(|e| UpstreamError::Malformed {
        service,
        message: e.to_string(),
    })
}

pub(crate) fn truncate(text: &str) -> &str {
    const MAX: usize = 256;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
