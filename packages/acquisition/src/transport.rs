//! The network seam of the acquisition client.
//!
//! [`HttpTransport`] performs real requests with `reqwest`.
//! [`ScriptedTransport`] answers from a closure so that acquisition and
//! session logic can be exercised without a network.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::AcquisitionError;
use crate::query::QueryRequest;

/// Default `User-Agent` sent to the remote service.
pub const DEFAULT_USER_AGENT: &str = concat!("region-map/", env!("CARGO_PKG_VERSION"));

/// Maximum length of a response body preview in logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Issues a single GET and returns the parsed JSON body.
///
/// Implementations do not retry and do not interpret the body; the
/// client handles `error` envelopes and retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError`] on transport failure, a non-success
    /// status, or an unparseable body.
    async fn get_json(&self, request: &QueryRequest) -> Result<Value, AcquisitionError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client sending the given `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError::Http`] if the TLS backend cannot be
    /// initialised.
    pub fn new(user_agent: &str) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, request: &QueryRequest) -> Result<Value, AcquisitionError> {
        log::debug!("GET {} {:?}", request.url, request.params);

        let response = self
            .client
            .get(&request.url)
            .query(&request.params)
            .timeout(request.timeout)
            .send()
            .await?;

        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            log::debug!("HTTP {status} body: {}", truncate_for_log(&body, BODY_PREVIEW_LEN));
            return Err(AcquisitionError::Status {
                status: status.as_u16(),
                url,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            log::debug!(
                "Unparseable body from {url}: {}",
                truncate_for_log(&body, BODY_PREVIEW_LEN)
            );
            AcquisitionError::Json(e)
        })
    }
}

/// Truncates a string to at most `max_len` bytes on a char boundary.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

type Handler = dyn Fn(&QueryRequest, usize) -> Result<Value, AcquisitionError> + Send + Sync;

/// In-memory transport that answers every request from a closure.
///
/// The closure receives the request and how many times a request with the
/// same `where` clause (count requests are tracked separately) was seen
/// before, so tests can script "fail twice, then succeed".
pub struct ScriptedTransport {
    handler: Box<Handler>,
    seen: Mutex<BTreeMap<String, usize>>,
    log: Mutex<Vec<QueryRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport answering with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&QueryRequest, usize) -> Result<Value, AcquisitionError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            seen: Mutex::new(BTreeMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn key(request: &QueryRequest) -> String {
        let where_clause = request.param("where").unwrap_or_default();
        if request.is_count() {
            format!("count:{where_clause}")
        } else {
            where_clause.to_string()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, request: &QueryRequest) -> Result<Value, AcquisitionError> {
        let previous = {
            let mut seen = self
                .seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let counter = seen.entry(Self::key(request)).or_insert(0);
            let previous = *counter;
            *counter += 1;
            previous
        };
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        (self.handler)(request, previous)
    }
}
