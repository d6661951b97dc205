//! The seam between `Transport`'s retry/checksum/session logic and the
//! actual HTTP call. Kept as a trait so tests drive the retry and checksum
//! behaviour without a real network, the same way a `Session` trait
//! separates session logic from its concrete implementation.

use std::fmt;

/// Which of the three process-wide connection pools a request uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pool {
    Api,
    Upload,
    Download,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Post
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// One outbound HTTP request, already fully formed (host chosen, checksum
/// computed, headers built).
#[derive(Clone, Debug)]
pub struct RawRequest {
    pub pool: Pool,
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The raw HTTP response: status code and body bytes. Never constructed to
/// represent a connection failure — that's `SendError`.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Failure to even get an HTTP response (connection refused, DNS failure,
/// timeout). Distinct from a non-200 status, which is still a `RawResponse`.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
}

/// Dispatches one already-formed request and returns its raw response.
/// Implementations do not retry, sleep, or interpret the response body —
/// that's `Transport`'s job.
#[async_trait::async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, SendError>;
}
