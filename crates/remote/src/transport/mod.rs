//! The seam between the paginating [`Client`](crate::Client) and the network.
//!
//! A [`Transport`] knows how to send one request and hand back one response
//! (status, body and the parsed `rel="next"` link). It knows nothing about
//! pagination, decoding or which endpoints exist; that all lives in the
//! client. [`HttpTransport`] is the real implementation; `MockTransport`
//! (behind the `mock` feature) serves canned pages for tests.

mod http;
mod link;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::http::{HttpTransport, Options};
pub use self::link::parse_next_link;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockTransport;
use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use reqwest::Method;
use std::pin::Pin;
use url::Url;

/// Chunks of a downloaded file, in order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Query parameters; keys may repeat (`include[]=a&include[]=b`).
pub type Query = Vec<(String, String)>;

/// A single outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub query: Query,
}
impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            query: Query::new(),
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// The request for the page behind a pagination link.
    ///
    /// Only the method is carried over. The link already encodes every
    /// parameter that shaped the first page, so resending the original query
    /// would duplicate (or contradict) the server's pagination state.
    pub fn follow(&self, next: Url) -> Self {
        Self {
            method: self.method.clone(),
            url: next,
            query: Query::new(),
        }
    }
}

/// A fully-read response to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    /// Target of the `rel="next"` link, if the server sent one.
    pub next: Option<Url>,
}
impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the remote site.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and read the whole response body.
    ///
    /// Non-success statuses are **not** errors at this level; the caller
    /// decides what a 404 means. Only failing to get a response at all is.
    async fn send(&self, request: Request) -> Result<Response>;

    /// Start downloading a file.
    ///
    /// Returns [`Download`](crate::error::ErrorKind::Download) if the server
    /// answers with a non-success status.
    async fn download(&self, url: &Url) -> Result<ByteStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_drops_query_but_keeps_method() {
        let first = Request {
            method: Method::POST,
            url: Url::parse("https://example.com/api/v1/courses").unwrap(),
            query: vec![("include[]".to_string(), "term".to_string())],
        };
        let next = Url::parse("https://example.com/api/v1/courses?page=2&include[]=term").unwrap();
        let followed = first.follow(next.clone());
        assert_eq!(followed.method, Method::POST);
        assert_eq!(followed.url, next);
        assert!(followed.query.is_empty());
    }

    #[test]
    fn test_response_success_range() {
        let response = |status| Response { status, body: vec![], next: None };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(302).is_success());
        assert!(!response(401).is_success());
    }
}
