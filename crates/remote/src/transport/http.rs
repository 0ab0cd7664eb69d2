//! [`Transport`] over HTTP(S) using `reqwest`, authenticated by a cookie jar.

use crate::error::{ErrorKind, Result};
use crate::transport::{ByteStream, Request, Response, Transport, parse_next_link};
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::LINK;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Knobs for the underlying HTTP client.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Whole-request timeout. `None` leaves it to the OS/TLS stack.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

/// Real network transport.
///
/// Cookies (loaded via [`cookies::load`](crate::cookies::load)) are the only
/// authentication; the jar is shared so that any `Set-Cookie` refreshes from
/// the server are honoured for the rest of the run.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}
impl HttpTransport {
    pub fn new(jar: Arc<Jar>, options: Options) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .cookie_provider(jar)
            .user_agent(options.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().or_raise(|| ErrorKind::Transport("could not build HTTP client".to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        let response = builder.send().await.or_raise(|| ErrorKind::Transport(request.url.to_string()))?;
        let status = response.status().as_u16();
        // Servers may split links across several headers.
        let next = response
            .headers()
            .get_all(LINK)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| parse_next_link(value, response.url()));
        let body = response.bytes().await.or_raise(|| ErrorKind::Transport(request.url.to_string()))?.to_vec();
        tracing::trace!(url = %request.url, status, bytes = body.len(), has_next = next.is_some(), "Received response");
        Ok(Response { status, body, next })
    }

    async fn download(&self, url: &Url) -> Result<ByteStream> {
        let response = self.client.get(url.clone()).send().await.or_raise(|| ErrorKind::Transport(url.to_string()))?;
        if !response.status().is_success() {
            exn::bail!(ErrorKind::Download {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let url = url.to_string();
        Ok(Box::pin(response.bytes_stream().map(move |chunk| {
            chunk.map(|bytes| bytes.to_vec()).or_raise(|| ErrorKind::Transport(url.clone()))
        })))
    }
}
