//! In-memory transport for testing.

use crate::error::{ErrorKind, Result};
use crate::transport::{ByteStream, Request, Response, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

#[derive(Debug, Clone)]
enum Route {
    Page { body: Vec<u8>, next: Option<Url> },
    Status(u16),
    File(Vec<u8>),
}

/// In-memory transport for testing.
///
/// Routes are keyed by the exact request URL (without the separately
/// supplied query), so a test can tell "first page requested with its query"
/// apart from "next link followed". Every request is recorded and can be
/// inspected with [`requests`](Self::requests).
///
/// Routes can be replaced between calls, which is how tests simulate the
/// remote site changing between sync runs.
///
/// # Examples
///
/// ```ignore
/// use mirror_remote::transport::{MockTransport, Request, Transport};
/// use serde_json::json;
/// use url::Url;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mock = MockTransport::default();
/// mock.page("https://example.com/api/v1/courses", json!([{ "id": 1 }]), None);
/// let url = Url::parse("https://example.com/api/v1/courses")?;
/// let response = mock.send(Request::get(url)).await?;
/// assert_eq!(response.status, 200);
/// assert_eq!(mock.requests().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<Request>>,
    downloads: Mutex<Vec<Url>>,
}

impl MockTransport {
    /// Serve `body` (a JSON value) with status 200 at `url`, optionally
    /// linking to a next page.
    ///
    /// Panics if `next` is not an absolute URL. If test setup is wrong, then
    /// test should not pass.
    pub fn page(&self, url: impl Into<String>, body: serde_json::Value, next: Option<&str>) -> &Self {
        let next = next.map(|n| Url::parse(n).unwrap_or_else(|_| panic!("MockTransport::page: invalid next link {n}")));
        let body = body.to_string().into_bytes();
        self.routes().insert(url.into(), Route::Page { body, next });
        self
    }

    /// Answer every request to `url` with an empty body and `status`.
    pub fn status(&self, url: impl Into<String>, status: u16) -> &Self {
        self.routes().insert(url.into(), Route::Status(status));
        self
    }

    /// Serve raw file contents at `url` for downloads.
    pub fn file(&self, url: impl Into<String>, contents: impl Into<Vec<u8>>) -> &Self {
        self.routes().insert(url.into(), Route::File(contents.into()));
        self
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    /// Every download started so far, in order.
    pub fn downloads(&self) -> Vec<Url> {
        lock(&self.downloads).clone()
    }

    /// Forget recorded requests and downloads (routes are kept).
    pub fn reset_log(&self) {
        lock(&self.requests).clear();
        lock(&self.downloads).clear();
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<String, Route>> {
        lock(&self.routes)
    }

    fn route(&self, url: &Url) -> Option<Route> {
        self.routes().get(url.as_str()).cloned()
    }
}

// A panicking test poisons the lock; the data is still fine to read.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        lock(&self.requests).push(request.clone());
        Ok(match self.route(&request.url) {
            Some(Route::Page { body, next }) => Response { status: 200, body, next },
            Some(Route::Status(status)) => Response { status, body: Vec::new(), next: None },
            Some(Route::File(body)) => Response { status: 200, body, next: None },
            None => Response {
                status: 404,
                body: Vec::new(),
                next: None,
            },
        })
    }

    async fn download(&self, url: &Url) -> Result<ByteStream> {
        lock(&self.downloads).push(url.clone());
        let status = match self.route(url) {
            Some(Route::File(contents)) => {
                // Two chunks, so consumers can't get away with assuming one.
                let (head, tail) = contents.split_at(contents.len() / 2);
                let chunks: Vec<Result<Vec<u8>>> = vec![Ok(head.to_vec()), Ok(tail.to_vec())];
                return Ok(Box::pin(futures::stream::iter(chunks)));
            },
            Some(Route::Status(status)) => status,
            Some(Route::Page { .. }) | None => 404,
        };
        exn::bail!(ErrorKind::Download { url: url.to_string(), status })
    }
}
