//! Client for the remote course site's JSON API.
//!
//! Every collection endpoint is paginated with `Link: <...>; rel="next"`
//! headers. [`Client::paginate`] turns that into a lazy stream of typed
//! [`Record`](crate::models::Record)s that still carry the raw JSON, which is
//! what ends up in the metadata history.

mod api;
mod client;
pub mod cookies;
pub mod error;
pub mod models;
pub mod transport;

pub use crate::client::Client;
pub use url::Url;
