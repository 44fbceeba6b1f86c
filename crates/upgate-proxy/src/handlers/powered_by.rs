use bytes::Bytes;
use http::Request;

use crate::dispatch::Handler;
use crate::response::ResponseSink;

/// Sets `X-Powered-By` before delegating. The handler may override it.
pub struct PoweredBy<H> {
    name: String,
    next: H,
}

impl<H: Handler> PoweredBy<H> {
    pub fn new(name: impl Into<String>, next: H) -> Self {
        Self {
            name: name.into(),
            next,
        }
    }
}

impl<H: Handler> Handler for PoweredBy<H> {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        res.set_header("X-Powered-By", &self.name);
        self.next.serve(req, res)
    }
}
