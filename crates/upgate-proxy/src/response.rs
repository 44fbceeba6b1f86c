//! Response capture for the gateway proxy protocol.
//!
//! The gateway wants status, headers, and the whole body as one value, and
//! it wants binary bodies base64-encoded. Handlers, on the other hand, are
//! written against a streaming sink: set headers, maybe set a status, then
//! write bytes. [`ResponseWriter`] sits in between.
//!
//! # Lifecycle
//!
//! ```text
//! Open ──set_status / first write_body──▶ Committed ──finalize──▶ Finalized
//! ```
//!
//! - `Open`: headers are mutable, nothing written yet.
//! - `Committed`: status and headers are frozen; header mutations are
//!   silently dropped, body bytes accumulate.
//! - `Finalized`: the [`Output`] has been produced. Further writes are a
//!   caller bug and return [`ProxyError::Finalized`].

use std::collections::BTreeMap;
use std::io;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::error::{ProxyError, ProxyResult};
use crate::event::Output;
use crate::header::HeaderMap;

/// `Content-Type` injected at commit time when the handler set none.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf8";

/// The capability a handler writes its response into.
pub trait ResponseSink {
    /// Value `name` currently holds (the most recently added one), if set.
    fn header(&self, name: &str) -> Option<&str>;

    /// Replace the value of `name`. Ignored once headers are committed.
    fn set_header(&mut self, name: &str, value: &str);

    /// Add another value for `name`. Ignored once headers are committed.
    fn add_header(&mut self, name: &str, value: &str);

    /// Commit headers with `status`. Only the first call has any effect.
    fn set_status(&mut self, status: u16);

    /// Append body bytes, committing with status 200 if nothing was
    /// committed yet. Returns the number of bytes accepted.
    fn write_body(&mut self, bytes: &[u8]) -> ProxyResult<usize>;
}

#[derive(Debug)]
enum State {
    Open,
    Committed {
        status: u16,
        headers: BTreeMap<String, String>,
    },
    Finalized,
}

/// Buffers a single handler response and renders it as an [`Output`].
///
/// One writer serves exactly one invocation.
#[derive(Debug)]
pub struct ResponseWriter {
    state: State,
    headers: HeaderMap,
    buf: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            state: State::Open,
            headers: HeaderMap::new(),
            buf: Vec::new(),
        }
    }

    /// Whether status and headers are frozen.
    pub fn is_committed(&self) -> bool {
        !matches!(self.state, State::Open)
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, State::Finalized)
    }

    /// Bytes buffered so far.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    fn commit(&mut self, status: u16) {
        if !self.headers.contains("Content-Type") {
            self.headers.set("Content-Type", DEFAULT_CONTENT_TYPE);
        }

        let headers = self.headers.collapse();
        debug!(status, headers = headers.len(), "response headers committed");
        self.state = State::Committed { status, headers };
    }

    /// Produce the invocation result.
    ///
    /// A writer that was never committed is committed here with status 200
    /// and default headers, so the result is always well-formed. The body is
    /// base64-encoded when the committed headers classify it as binary.
    pub fn finalize(&mut self) -> ProxyResult<Output> {
        if matches!(self.state, State::Open) {
            self.commit(200);
        }

        let (status, headers) = match std::mem::replace(&mut self.state, State::Finalized) {
            State::Committed { status, headers } => (status, headers),
            State::Open | State::Finalized => return Err(ProxyError::Finalized),
        };

        let buf = std::mem::take(&mut self.buf);
        let binary = is_binary(
            headers.get("Content-Type").map(String::as_str),
            headers.get("Content-Encoding").map(String::as_str),
        );

        let body = if binary {
            STANDARD.encode(&buf)
        } else {
            match String::from_utf8(buf) {
                Ok(text) => text,
                Err(err) => {
                    warn!(status, "textual response body is not valid UTF-8");
                    String::from_utf8_lossy(err.as_bytes()).into_owned()
                }
            }
        };

        Ok(Output {
            status_code: status,
            headers,
            body,
            is_base64_encoded: binary,
        })
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for ResponseWriter {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if self.is_committed() {
            debug!(header = name, "ignoring header set after commit");
            return;
        }
        self.headers.set(name, value);
    }

    fn add_header(&mut self, name: &str, value: &str) {
        if self.is_committed() {
            debug!(header = name, "ignoring header add after commit");
            return;
        }
        self.headers.append(name, value);
    }

    fn set_status(&mut self, status: u16) {
        if self.is_committed() {
            return;
        }
        self.commit(status);
    }

    fn write_body(&mut self, bytes: &[u8]) -> ProxyResult<usize> {
        match self.state {
            State::Open => self.commit(200),
            State::Committed { .. } => {}
            State::Finalized => return Err(ProxyError::Finalized),
        }
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Whether a body with these headers must travel base64-encoded.
///
/// Anything whose `Content-Type` is not confidently textual is binary, and a
/// `Content-Encoding` of exactly `gzip` is binary regardless of type.
pub fn is_binary(content_type: Option<&str>, content_encoding: Option<&str>) -> bool {
    !is_text_mime(content_type.unwrap_or_default()) || content_encoding == Some("gzip")
}

/// Whether `content_type` names textual data.
///
/// The header value is matched as written. Parameters and letter case are
/// not normalized, so `application/json; charset=utf-16` stays binary and
/// its bytes survive the trip.
pub fn is_text_mime(kind: &str) -> bool {
    kind.ends_with("svg+xml")
        || kind.starts_with("text/")
        || (kind.starts_with("application/") && kind.ends_with("json"))
        || (kind.starts_with("application/") && kind.ends_with("xml"))
}
