//! In-memory [`ResponseSink`] for middleware that needs to see a whole
//! response before passing it on.

use crate::error::ProxyResult;
use crate::header::HeaderMap;
use crate::response::ResponseSink;

/// Records what a handler writes, with the same commit rules as
/// [`ResponseWriter`](crate::ResponseWriter): the first status wins, a body
/// write commits 200, and header changes after commit are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recorder {
    headers: HeaderMap,
    status: Option<u16>,
    body: Vec<u8>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status the handler committed, if any.
    pub fn committed_status(&self) -> Option<u16> {
        self.status
    }

    /// Committed status, or 200 when the handler never set one.
    pub fn status(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Write the recorded response into `res`.
    pub fn replay(&self, res: &mut dyn ResponseSink) -> ProxyResult<()> {
        for name in self.headers.names() {
            let mut values = self.headers.values(name).iter();
            if let Some(first) = values.next() {
                res.set_header(name, first);
            }
            for value in values {
                res.add_header(name, value);
            }
        }

        if let Some(status) = self.status {
            res.set_status(status);
        }
        if !self.body.is_empty() {
            res.write_body(&self.body)?;
        }
        Ok(())
    }
}

impl ResponseSink for Recorder {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if self.status.is_none() {
            self.headers.set(name, value);
        }
    }

    fn add_header(&mut self, name: &str, value: &str) {
        if self.status.is_none() {
            self.headers.append(name, value);
        }
    }

    fn set_status(&mut self, status: u16) {
        self.status.get_or_insert(status);
    }

    fn write_body(&mut self, bytes: &[u8]) -> ProxyResult<usize> {
        self.status.get_or_insert(200);
        self.body.extend_from_slice(bytes);
        Ok(bytes.len())
    }
}
