use bytes::Bytes;
use http::Request;

use crate::dispatch::Handler;
use crate::response::ResponseSink;

/// Path answered by [`Ping`].
pub const PING_PATH: &str = "/_ping";

/// Liveness route in front of another handler.
pub struct Ping<H> {
    next: H,
}

impl<H: Handler> Ping<H> {
    pub fn new(next: H) -> Self {
        Self { next }
    }
}

impl<H: Handler> Handler for Ping<H> {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        if req.uri().path() == PING_PATH {
            res.write_body(b":)\n")?;
            return Ok(());
        }

        self.next.serve(req, res)
    }
}
