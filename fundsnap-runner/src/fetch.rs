//! Page and file transport.
//!
//! The [`Fetcher`] trait abstracts over the network so the pipeline can be
//! driven by an in-memory stub in tests. [`HttpFetcher`] is the blocking
//! reqwest implementation with bounded retries and exponential backoff.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Structured transport errors. Any of these is fatal for the fund being
/// processed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

/// A downloaded body with the content type the server advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl Fetched {
    pub fn new(body: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.map(str::to_string),
        }
    }

    /// Body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Retrieves a URL's body. Pages and downloadable files share one contract.
pub trait Fetcher {
    fn fetch(&self, url: &Url) -> Result<Fetched, FetchError>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn fetch(&self, url: &Url) -> Result<Fetched, FetchError> {
        (**self).fetch(url)
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total attempts per URL, including the first.
    pub attempts: u32,
    /// Delay before retry `n` is `backoff_base ^ n` seconds.
    pub backoff_base: f64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base: 1.7,
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (compatible; fundsnap/0.1)".into(),
            accept_language: "pl-PL,pl;q=0.9,en;q=0.8".into(),
        }
    }
}

impl HttpConfig {
    /// Sleep before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.backoff_base.powi(exponent)).unwrap_or_default()
    }
}

/// Blocking HTTP fetcher.
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn attempt(&self, url: &Url) -> Result<Fetched, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let resp = self
            .client
            .get(url.as_str())
            .header(ACCEPT_LANGUAGE, self.config.accept_language.as_str())
            .header(REFERER, url.as_str())
            .send()
            .map_err(network)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().map_err(network)?.to_vec();

        Ok(Fetched { body, content_type })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Fetched, FetchError> {
        let attempts = self.config.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.attempt(url) {
                Ok(fetched) => {
                    debug!(%url, attempt, bytes = fetched.body.len(), "fetched");
                    return Ok(fetched);
                }
                Err(e) => {
                    warn!(%url, attempt, error = %e, "fetch attempt failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(self.config.backoff(attempt));
                    }
                }
            }
        }

        let last = last_error.unwrap_or_else(|| FetchError::Network {
            url: url.to_string(),
            reason: "no attempt made".into(),
        });
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last: Box::new(last),
        })
    }
}
