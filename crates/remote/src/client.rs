//! Paginated access to the site's JSON API.

use crate::error::{ErrorKind, Result};
use crate::transport::{ByteStream, Query, Request, Response, Transport};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// Path (relative to the site) that every relative endpoint is resolved against.
const API_ROOT: &str = "api/v1/";

/// Client for one remote site.
///
/// Cheap to clone; the transport is shared.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    api: Url,
}
impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("api", &self.api.as_str()).finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client for the site at `site` (e.g. `https://school.example.com`).
    ///
    /// Returns [`InvalidUrl`](ErrorKind::InvalidUrl) if the site cannot be a
    /// base URL (e.g. `mailto:` or `data:`).
    pub fn new(site: &Url, transport: Arc<dyn Transport>) -> Result<Self> {
        let mut site = site.clone();
        if site.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidUrl(site.to_string()));
        }
        // Joining onto "https://host/prefix" would replace "prefix".
        if !site.path().ends_with('/') {
            let path = format!("{}/", site.path());
            site.set_path(&path);
        }
        let api = site.join(API_ROOT).or_raise(|| ErrorKind::InvalidUrl(site.to_string()))?;
        Ok(Self { transport, api })
    }

    pub fn api_root(&self) -> &Url {
        &self.api
    }

    /// Absolute URLs pass through untouched; anything else is relative to the API root.
    pub fn resolve(&self, endpoint: &str) -> Result<Url> {
        match Url::parse(endpoint) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.api.join(endpoint).or_raise(|| ErrorKind::InvalidUrl(endpoint.to_string()))
            },
            Err(e) => Err(e).or_raise(|| ErrorKind::InvalidUrl(endpoint.to_string())),
        }
    }

    /// Lazily yield every item of a paginated collection.
    ///
    /// The first request carries `query`; every following request is exactly
    /// the server's `rel="next"` link (see [`Request::follow`]). Only one page
    /// is held in memory at a time. The stream ends after the first page
    /// without a `next` link.
    ///
    /// A non-success status yields a single
    /// [`CollectionFetch`](ErrorKind::CollectionFetch) error and ends the
    /// stream; nothing is retried. The stream cannot be resumed: dropping it
    /// part-way through and calling `paginate` again starts from page one.
    pub fn paginate<'a, T>(&'a self, endpoint: impl Into<String>, query: Query) -> impl Stream<Item = Result<T>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        let endpoint = endpoint.into();
        stream! {
            let url = match self.resolve(&endpoint) {
                Ok(url) => url,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let mut request = Request::get(url).with_query(query);
            let mut pages = 0_usize;
            loop {
                let (items, next) = match self.page::<T>(&endpoint, request.clone()).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                pages += 1;
                for item in items {
                    yield Ok(item);
                }
                match next {
                    Some(next) => request = request.follow(next),
                    None => break,
                }
            }
            tracing::debug!(endpoint = %endpoint, pages, "Collection exhausted");
        }
    }

    async fn page<T: DeserializeOwned>(&self, endpoint: &str, request: Request) -> Result<(Vec<T>, Option<Url>)> {
        let Response { status, body, next } = self.transport.send(request).await?;
        if !(200..300).contains(&status) {
            exn::bail!(ErrorKind::CollectionFetch {
                endpoint: endpoint.to_string(),
                status,
            });
        }
        let items = serde_json::from_slice::<Vec<T>>(&body).or_raise(|| ErrorKind::Decode(endpoint.to_string()))?;
        Ok((items, next))
    }

    /// Fetch a single (non-paginated) resource.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: Query) -> Result<T> {
        let url = self.resolve(endpoint)?;
        let response = self.transport.send(Request::get(url).with_query(query)).await?;
        if !response.is_success() {
            exn::bail!(ErrorKind::Fetch {
                endpoint: endpoint.to_string(),
                status: response.status,
            });
        }
        serde_json::from_slice(&response.body).or_raise(|| ErrorKind::Decode(endpoint.to_string()))
    }

    /// Start streaming a file's contents.
    pub async fn download(&self, url: &Url) -> Result<ByteStream> {
        self.transport.download(url).await
    }
}
