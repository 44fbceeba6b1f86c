//! Invocation dispatch.
//!
//! [`Dispatcher`] owns the wrapped [`Handler`] and turns one gateway event
//! into one [`Output`]. A fresh [`ResponseWriter`] is built for every call
//! and dropped when the call returns, so no response state crosses
//! invocations.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::Request;
use tracing::{error, info, info_span};

use crate::error::ProxyResult;
use crate::event::{Input, Output};
use crate::request::new_request;
use crate::response::{ResponseSink, ResponseWriter, DEFAULT_CONTENT_TYPE};

/// Request handling code driven by the dispatcher.
///
/// Returning `Err` is a handler fault: whatever was written is discarded
/// and the gateway receives a generic 500.
pub trait Handler: Send + Sync {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()>;
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        (**self).serve(req, res)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        (**self).serve(req, res)
    }
}

/// A [`Handler`] backed by a closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&Request<Bytes>, &mut dyn ResponseSink) -> anyhow::Result<()> + Send + Sync,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Request<Bytes>, &mut dyn ResponseSink) -> anyhow::Result<()> + Send + Sync,
{
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        (self.f)(req, res)
    }
}

/// Runs the wrapped handler once per gateway event.
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn Handler>,
}

impl Dispatcher {
    pub fn new<H: Handler + 'static>(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn from_arc(handler: Arc<dyn Handler>) -> Self {
        Self { handler }
    }

    /// Parse a raw gateway event and handle it.
    pub fn handle_value(&self, event: serde_json::Value) -> ProxyResult<Output> {
        let input: Input = serde_json::from_value(event)?;
        self.handle(&input)
    }

    /// Handle one event.
    ///
    /// Errors only when the event cannot be turned into a request. Handler
    /// panics and handler errors are contained and reported as a 500
    /// result so the runtime keeps serving later invocations.
    pub fn handle(&self, input: &Input) -> ProxyResult<Output> {
        let req = new_request(input)?;

        let span = info_span!(
            "invocation",
            request_id = %input.request_context.request_id,
            method = %req.method(),
            path = %req.uri().path(),
        );
        let _enter = span.enter();
        let started = Instant::now();

        let mut res = ResponseWriter::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.serve(&req, &mut res)));

        let output = match outcome {
            Ok(Ok(())) => res.finalize()?,
            Ok(Err(err)) => {
                error!(error = %err, "handler failed");
                internal_error()
            }
            Err(payload) => {
                error!(panic = panic_message(payload.as_ref()), "handler panicked");
                internal_error()
            }
        };

        info!(
            status = output.status_code,
            base64 = output.is_base64_encoded,
            body_len = output.body.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "invocation complete"
        );

        Ok(output)
    }
}

fn internal_error() -> Output {
    Output {
        status_code: 500,
        headers: BTreeMap::from([(
            "Content-Type".to_string(),
            DEFAULT_CONTENT_TYPE.to_string(),
        )]),
        body: "Internal Server Error".to_string(),
        is_base64_encoded: false,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
