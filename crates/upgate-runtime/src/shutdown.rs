//! Shutdown hooks.
//!
//! Components register closers as they start. On the first terminating
//! signal the closers run in reverse registration order, so whatever was
//! started last is torn down first. The registry fires at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::{error, info, warn};

use crate::error::RuntimeResult;

type Closer = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Registry of closers run once at shutdown.
pub struct ShutdownHooks {
    closers: Mutex<Vec<(String, Closer)>>,
    fired: AtomicBool,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self {
            closers: Mutex::new(Vec::new()),
            fired: AtomicBool::new(false),
        }
    }

    /// Register a closer. Closers added after the hooks fired never run.
    pub fn add<F>(&self, name: impl Into<String>, closer: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let name = name.into();
        if self.has_fired() {
            warn!(closer = %name, "shutdown already ran, closer will not be called");
            return;
        }
        self.lock().push((name, Box::new(closer)));
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Number of closers waiting to run.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every closer, last registered first.
    ///
    /// Only the first call does anything. A failing closer is logged and the
    /// remaining closers still run. Returns the number of failures.
    pub fn run(&self) -> usize {
        if self.fired.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let closers = std::mem::take(&mut *self.lock());
        info!(closers = closers.len(), "running shutdown hooks");

        let mut failures = 0;
        for (name, closer) in closers.into_iter().rev() {
            if let Err(err) = closer() {
                error!(closer = %name, error = %err, "shutdown hook failed");
                failures += 1;
            }
        }
        failures
    }

    /// Wait for SIGINT (or SIGTERM on Unix), then run the hooks.
    pub async fn wait_for_signal(&self) -> RuntimeResult<usize> {
        wait_for_terminate().await?;
        info!("shutdown signal received");
        Ok(self.run())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Closer)>> {
        // A closer never runs while the lock is held, so poisoning can only
        // come from a panic in push/take; the Vec is still consistent.
        self.closers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ShutdownHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_terminate() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
