use std::collections::BTreeMap;

use bytes::Bytes;
use http::Request;
use serde_json::json;

use crate::dispatch::Handler;
use crate::request::RemoteAddr;
use crate::response::ResponseSink;

/// Answers every request with a JSON description of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl Handler for Echo {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        let headers: BTreeMap<&str, &str> = req
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
            .collect();

        let body = json!({
            "method": req.method().as_str(),
            "path": req.uri().path(),
            "query": req.uri().query().unwrap_or_default(),
            "headers": headers,
            "remote_addr": req.extensions().get::<RemoteAddr>().map(|addr| addr.0.as_str()),
            "body_len": req.body().len(),
        });

        res.set_header("Content-Type", "application/json");
        res.write_body(&serde_json::to_vec(&body)?)?;
        Ok(())
    }
}
