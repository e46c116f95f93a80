//! The HTTP transport virtual workers issue requests through.
//!
//! Workers only ever see a [`Transport`]: the default [`ReqwestTransport`] wraps a
//! shared [`reqwest::Client`], and tests substitute their own implementation to
//! drive large runs without a network.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use std::{error, fmt};

use crate::GanderError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// What a worker learns from one completed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code returned by the server.
    pub status: u16,
    /// Time from sending the request until the full body was received.
    pub duration: Duration,
}

/// A request that never produced a response: refused connection, DNS failure,
/// timeout or an interrupted body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportError {
    pub url: String,
    pub detail: String,
}
impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "request to {} failed: {}", self.url, self.detail)
    }
}
impl error::Error for TransportError {}

/// Issues a single GET and reports its status and duration.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by one [`reqwest::Client`] shared by every worker.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}
impl ReqwestTransport {
    /// Build a client that gives up on any request taking longer than `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, GanderError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(ReqwestTransport { client })
    }

    /// Use an already configured client.
    pub fn with_client(client: Client) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let started = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| TransportError {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        let status = response.status().as_u16();
        // Duration covers the body too, so drain it before stopping the clock.
        response.bytes().await.map_err(|e| TransportError {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        let duration = started.elapsed();
        trace!("GET {}: {} in {:?}", url, status, duration);
        Ok(HttpResponse { status, duration })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn reports_status_and_duration() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(GET).path("/ok");
                then.status(200).body("hello");
            })
            .await;
        let missing = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let response = transport.get(&server.url("/ok")).await.unwrap();
        assert_eq!(response.status, 200);
        let response = transport.get(&server.url("/missing")).await.unwrap();
        assert_eq!(response.status, 404);

        ok.assert_hits_async(1).await;
        missing.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let error = transport.get("http://127.0.0.1:1/").await.unwrap_err();
        assert_eq!(error.url, "http://127.0.0.1:1/");
        assert!(!error.detail.is_empty());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow");
                then.status(200).delay(Duration::from_millis(500));
            })
            .await;
        let transport = ReqwestTransport::new(Duration::from_millis(50)).unwrap();
        assert!(transport.get(&server.url("/slow")).await.is_err());
    }
}
