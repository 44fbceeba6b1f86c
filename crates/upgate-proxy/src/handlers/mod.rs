//! Handlers bundled with the proxy.
//!
//! - [`Ping`] answers `/_ping` and delegates everything else.
//! - [`Echo`] describes the request it received.
//! - [`StaticFiles`] serves a directory.
//!
//! Middleware wrapping another handler:
//!
//! - [`PoweredBy`] sets `X-Powered-By`.
//! - [`Headers`] applies path-matched header rules.
//! - [`ErrorPages`] swaps error responses for HTML pages.
//! - [`Gzip`] compresses bodies for clients that accept it.

mod echo;
mod error_pages;
mod gzip;
mod headers;
mod ping;
mod powered_by;
mod static_files;

pub use echo::Echo;
pub use error_pages::{accepts_html, ErrorPages, Page, Pages};
pub use gzip::{accepts_gzip, Gzip, DEFAULT_MIN_SIZE};
pub use headers::{Fields, HeaderRules, Headers, HEADERS_FILE};
pub use ping::{Ping, PING_PATH};
pub use powered_by::PoweredBy;
pub use static_files::{content_type_for, StaticFiles};
