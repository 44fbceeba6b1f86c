//! upgate-proxy — runs conventional HTTP handlers inside a gateway proxy
//! invocation model.
//!
//! The gateway hands the function one fully-buffered event per request and
//! expects one structured result back. This crate bridges that model to
//! handler code written against a streaming response abstraction.
//!
//! # Architecture
//!
//! ```text
//! gateway event (JSON)
//!   │
//!   ▼
//! Dispatcher::handle
//!   │
//!   ├── new_request: Input → http::Request<Bytes>
//!   ├── Handler::serve(request, &mut ResponseWriter)
//!   │     set_header / set_status / write_body
//!   ├── ResponseWriter::finalize → text or base64 body
//!   │
//!   ▼
//! Output { statusCode, headers, body, isBase64Encoded }
//! ```
//!
//! Every invocation gets its own [`ResponseWriter`]; nothing survives past
//! a single call to [`Dispatcher::handle`].

pub mod dispatch;
mod error;
pub mod event;
pub mod handlers;
mod header;
mod recorder;
pub mod request;
pub mod response;

pub use dispatch::{handler_fn, Dispatcher, Handler, HandlerFn};
pub use error::{ProxyError, ProxyResult};
pub use event::{Identity, Input, Output, RequestContext};
pub use header::{canonical_name, HeaderMap};
pub use recorder::Recorder;
pub use request::{new_request, RemoteAddr};
pub use response::{is_binary, is_text_mime, ResponseSink, ResponseWriter, DEFAULT_CONTENT_TYPE};
