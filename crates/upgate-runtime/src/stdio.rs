//! Newline-delimited JSON event transport.
//!
//! Each input line is a [`Message`]; each processed line gets exactly one
//! [`Reply`] line. Lines are handled in order, one at a time, matching the
//! platform's one-invocation-at-a-time delivery.

use std::io::{self, BufRead};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use upgate_proxy::{Dispatcher, Output, ProxyResult};

use crate::error::RuntimeResult;

/// One inbound line: the gateway event plus the platform's invocation
/// context.
#[derive(Debug, Deserialize)]
pub struct Message {
    pub event: serde_json::Value,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// One outbound line. Exactly one of the fields is present.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Output>,
}

impl Reply {
    fn value(output: Output) -> Self {
        Self {
            error: None,
            value: Some(output),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            value: None,
        }
    }
}

/// Serve events from stdin until it closes or `stop` turns true.
///
/// stdin is read on its own thread rather than the runtime's blocking pool,
/// so a read that never returns cannot hold up runtime shutdown.
pub async fn serve_stdio(
    dispatcher: Arc<Dispatcher>,
    stop: watch::Receiver<bool>,
) -> RuntimeResult<u64> {
    let lines = spawn_stdin_reader()?;
    run(dispatcher, lines, tokio::io::stdout(), stop).await
}

/// Serve events read from `input`, writing replies to `output`.
///
/// Returns the number of replies written once `input` reaches EOF or `stop`
/// turns true. An invocation already running when `stop` fires still gets
/// its reply.
pub async fn serve<R, W>(
    dispatcher: Arc<Dispatcher>,
    input: R,
    output: W,
    stop: watch::Receiver<bool>,
) -> RuntimeResult<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    run(dispatcher, input.lines(), output, stop).await
}

trait LineSource {
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

impl<R: AsyncBufRead + Unpin> LineSource for Lines<R> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Lines::next_line(self).await
    }
}

impl LineSource for mpsc::Receiver<io::Result<String>> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.recv().await.transpose()
    }
}

fn spawn_stdin_reader() -> io::Result<mpsc::Receiver<io::Result<String>>> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::Builder::new()
        .name("upgate-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

async fn run<L, W>(
    dispatcher: Arc<Dispatcher>,
    mut lines: L,
    mut output: W,
    mut stop: watch::Receiver<bool>,
) -> RuntimeResult<u64>
where
    L: LineSource,
    W: AsyncWrite + Unpin,
{
    let mut replies = 0u64;

    loop {
        let line = tokio::select! {
            biased;
            _ = stopped(&mut stop) => {
                info!(replies, "event transport stopped");
                return Ok(replies);
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let reply = invoke(&dispatcher, line).await;

        let mut encoded = serde_json::to_vec(&reply)?;
        encoded.push(b'\n');
        output.write_all(&encoded).await?;
        output.flush().await?;
        replies += 1;
    }

    info!(replies, "event input closed");
    Ok(replies)
}

/// Resolves once `stop` holds `true`. A dropped sender never stops the loop.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn invoke(dispatcher: &Arc<Dispatcher>, line: String) -> Reply {
    let dispatcher = Arc::clone(dispatcher);
    let joined = tokio::task::spawn_blocking(move || -> ProxyResult<Output> {
        let message: Message = serde_json::from_str(&line)?;
        if let Some(id) = message.context.get("awsRequestId").and_then(|v| v.as_str()) {
            debug!(aws_request_id = id, "invocation received");
        }
        dispatcher.handle_value(message.event)
    })
    .await;

    match joined {
        Ok(Ok(output)) => Reply::value(output),
        Ok(Err(err)) => {
            warn!(error = %err, "invocation failed");
            Reply::error(err.to_string())
        }
        Err(err) => {
            warn!(error = %err, "invocation task failed");
            Reply::error(format!("invocation aborted: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_encoding_omits_absent_fields() {
        let reply = Reply::error("bad event");
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"error":"bad event"}"#
        );
    }

    #[test]
    fn message_context_is_optional() {
        let message: Message = serde_json::from_str(r#"{"event":{"path":"/"}}"#).unwrap();
        assert_eq!(message.event["path"], "/");
        assert!(message.context.is_null());
    }
}
