//! County feed HTTP client.

use std::time::Duration;

use callwatch_recon::{ActiveCall, CallSource, CancelToken, Category};

use crate::wire;

pub const DEFAULT_BASE_URL: &str = "https://api.chesterfield.gov/api";
pub const DEFAULT_REFERER: &str = "https://www.chesterfield.gov/";
const USER_AGENT: &str = concat!("callwatch/", env!("CARGO_PKG_VERSION"));
/// Longest `Retry-After` the client waits out. Beyond this the request
/// fails and the next harvest is the retry.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Error type for feed requests.
#[derive(Debug)]
pub enum FeedError {
    /// Connection, timeout or client construction failure
    Network(String),
    /// Non-success HTTP status with (truncated) body
    Http(u16, String),
    /// Body was not the expected JSON shape
    Parse(String),
    /// Cancellation token fired before or between attempts
    Cancelled,
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Network(msg) => write!(f, "network error: {}", msg),
            FeedError::Http(code, body) if body.is_empty() => {
                write!(f, "received invalid status code: {}", code)
            }
            FeedError::Http(code, body) => {
                write!(f, "received invalid status code: {} ({})", code, body)
            }
            FeedError::Parse(msg) => write!(f, "parse error: {}", msg),
            FeedError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for FeedError {}

/// Connection settings for [`FeedClient`].
#[derive(Debug, Clone)]
pub struct FeedOptions {
    pub base_url: String,
    pub referer: String,
    pub timeout: Duration,
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    pub retry_base: Duration,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 1,
            retry_base: Duration::from_secs(1),
        }
    }
}

/// Calls-for-service client (blocking).
#[derive(Clone)]
pub struct FeedClient {
    http: reqwest::blocking::Client,
    base_url: String,
    referer: String,
    max_retries: u32,
    retry_base: Duration,
}

impl FeedClient {
    pub fn new(options: FeedOptions) -> Result<Self, FeedError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .map_err(|e| FeedError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            referer: options.referer,
            max_retries: options.max_retries,
            retry_base: options.retry_base,
        })
    }

    /// Client against a different host (tests, mirrors), default settings otherwise.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FeedError> {
        Self::new(FeedOptions {
            base_url: base_url.into(),
            ..FeedOptions::default()
        })
    }

    pub fn calls_url(&self, category: Category) -> String {
        let service = match category {
            Category::Police => "Police",
            Category::Fire => "Fire",
        };
        format!("{}/{}/V1.0/Calls/CallsForService", self.base_url, service)
    }

    /// Fetch the calls currently active for one category.
    pub fn fetch(&self, category: Category, cancel: &CancelToken) -> Result<Vec<ActiveCall>, FeedError> {
        let url = self.calls_url(category);
        let body = self.get_with_retry(&url, cancel)?;
        let calls = wire::decode(&body, category)?;
        log::debug!("fetched {} active {} calls", calls.len(), category);
        Ok(calls)
    }

    /// GET with exponential backoff on network errors, 429 and 5xx.
    /// Other 4xx fail immediately.
    fn get_with_retry(&self, url: &str, cancel: &CancelToken) -> Result<String, FeedError> {
        let mut backoff = self.retry_base;
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(FeedError::Cancelled);
            }

            let result = self
                .http
                .get(url)
                .header("Accept", "application/json")
                .header("Referer", &self.referer)
                .send();

            let (wait, reason, failure) = match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if resp.status().is_success() {
                        return resp.text().map_err(|e| {
                            FeedError::Network(format!("failed to read response body: {}", e))
                        });
                    }

                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    let body = resp.text().unwrap_or_default();
                    let failure = FeedError::Http(status, body.chars().take(200).collect());

                    // Not retryable
                    if status < 500 && status != 429 {
                        return Err(failure);
                    }

                    let wait = if status == 429 {
                        retry_after.unwrap_or(backoff)
                    } else {
                        backoff
                    };
                    if wait > MAX_RETRY_AFTER {
                        log::warn!("{} asked to wait {:?}, giving up", url, wait);
                        return Err(failure);
                    }
                    (wait, format!("HTTP {}", status), failure)
                }
                Err(e) => {
                    let reason = e.to_string();
                    (backoff, reason.clone(), FeedError::Network(reason))
                }
            };

            if attempt == self.max_retries {
                return Err(failure);
            }
            attempt += 1;

            log::warn!(
                "retry {}/{} in {:?} ({}) for {}",
                attempt,
                self.max_retries,
                wait,
                reason,
                url,
            );
            if !cancel.sleep(wait) {
                return Err(FeedError::Cancelled);
            }
            backoff = backoff.saturating_mul(2);
        }
    }
}

impl CallSource for FeedClient {
    type Error = FeedError;

    fn active_calls(&self, category: Category, cancel: &CancelToken) -> Result<Vec<ActiveCall>, FeedError> {
        self.fetch(category, cancel)
    }
}
