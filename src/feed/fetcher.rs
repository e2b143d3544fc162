use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;

const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Outcome of a single GET.
///
/// Produced exactly once per URL. There is no retry: a transient failure is
/// reported as-is and left for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Final response was `200 OK`; holds the full body.
    Body(Vec<u8>),
    /// Final response status was anything other than 200. The body is not read.
    HttpError(u16),
    /// The request could not be completed: DNS, connect, TLS, redirect loop,
    /// timeout, truncated or oversized body.
    TransportError(String),
}

/// Knobs for the HTTP client and per-request limits.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Per-request timeout covering connect, headers, and body. `None` waits
    /// indefinitely.
    pub timeout: Option<Duration>,
    /// Upper bound on the body size in bytes.
    pub max_body_bytes: usize,
    /// Maximum redirect hops before the request is abandoned.
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            max_body_bytes: DEFAULT_MAX_FEED_SIZE,
            max_redirects: 10,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

/// Builds the shared HTTP client.
///
/// Redirects are followed by the client itself, capped at
/// `settings.max_redirects` hops with loop detection.
pub fn build_client(settings: &FetchSettings) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .redirect(redirect_policy(settings.max_redirects))
        .build()
}

fn redirect_policy(max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error(format!("Too many redirects (max {})", max_redirects));
        }

        // Detect loops
        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len(),
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Fetches one feed URL.
///
/// # Arguments
///
/// * `client` - HTTP client built by [`build_client`]
/// * `url` - URL exactly as it appeared in the input
/// * `settings` - Timeout and size limits
///
/// # Returns
///
/// A [`FetchOutcome`]; this function never fails. Every error condition is
/// folded into [`FetchOutcome::HttpError`] or [`FetchOutcome::TransportError`].
pub async fn fetch(client: &reqwest::Client, url: &str, settings: &FetchSettings) -> FetchOutcome {
    let request = fetch_body(client, url, settings.max_body_bytes);

    let result = match settings.timeout {
        Some(limit) => match tokio::time::timeout(limit, request).await {
            Ok(result) => result,
            Err(_) => Err(FetchOutcome::TransportError(format!(
                "Request timed out after {:?}",
                limit
            ))),
        },
        None => request.await,
    };

    match result {
        Ok(bytes) => {
            tracing::debug!(url = %url, bytes = bytes.len(), "Fetched feed body");
            FetchOutcome::Body(bytes)
        }
        Err(outcome) => {
            tracing::debug!(url = %url, outcome = ?outcome, "Fetch did not produce a body");
            outcome
        }
    }
}

/// The whole request, with any non-body outcome carried in `Err`.
async fn fetch_body(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchOutcome> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchOutcome::TransportError(error_chain(&e)))?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(FetchOutcome::HttpError(response.status().as_u16()));
    }

    read_limited_bytes(response, limit).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchOutcome> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(too_large(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchOutcome::TransportError(error_chain(&e)))?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(too_large(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: Received fewer bytes than Content-Length promised
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchOutcome::TransportError(format!(
                "Incomplete response: expected {} bytes, received {}",
                expected,
                bytes.len()
            )));
        }
    }

    Ok(bytes)
}

fn too_large(limit: usize) -> FetchOutcome {
    FetchOutcome::TransportError(format!("Response too large (limit {} bytes)", limit))
}

/// Renders an error with its full `source()` chain, so DNS and TLS causes
/// hidden behind reqwest's generic message end up in the report.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
