//! Snapshot download functionality.

use crate::error::ImportError;
use crate::snapshot::parse_snapshot;
use crate::types::Resource;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use tracing::{debug, info};

/// User agent sent with every snapshot request.
pub const USER_AGENT: &str = concat!("peeringdb-dump/", env!("CARGO_PKG_VERSION"));

/// Longest body excerpt quoted in a fetch error.
const BODY_SNIPPET_LEN: usize = 200;

/// Builds the HTTP client shared by every fetch of a run.
///
/// No timeout is configured; the client defaults apply.
pub fn http_client() -> Result<reqwest::Client, ImportError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Downloads one resource's snapshot and returns its `data` array.
///
/// # Arguments
///
/// * `client` - Shared HTTP client
/// * `base_url` - Snapshot CDN base URL
/// * `resource` - The resource to fetch
///
/// # Returns
///
/// The snapshot objects in source order, or an error on a non-success
/// status, a transport failure or a malformed body.
pub(crate) async fn fetch_snapshot(
    client: &reqwest::Client,
    base_url: &str,
    resource: Resource,
) -> Result<Vec<Value>, ImportError> {
    let url = resource.snapshot_url(base_url);
    info!("Retrieving snapshot from {}", url);

    let response = client.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|_| "<no-body>".into());
        return Err(ImportError::FetchFailed(format!(
            "HTTP {} from {} body_snip={}",
            status,
            url,
            snippet(&body)
        )));
    }

    let body = response.bytes().await?;
    debug!("Received {} bytes for {}", body.len(), resource);

    parse_snapshot(&body)
}

/// Leading part of `body`, cut on a char boundary.
fn snippet(body: &str) -> &str {
    if body.len() <= BODY_SNIPPET_LEN {
        return body;
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
