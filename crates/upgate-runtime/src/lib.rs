//! upgate-runtime — hosting runtime plumbing for the proxy.
//!
//! The platform shim starts the binary once and feeds it gateway events
//! over stdin, one JSON document per line, expecting one reply line per
//! event on stdout:
//!
//! ```text
//! platform shim
//!   │  {"event": {...}, "context": {...}}\n
//!   ▼
//! stdio::serve ──spawn_blocking──▶ Dispatcher::handle
//!   │  {"value": {...}}\n  or  {"error": "..."}\n
//!   ▼
//! platform shim
//! ```
//!
//! stdout carries protocol replies only; logs go to stderr.

mod error;
pub mod logging;
pub mod shutdown;
pub mod stdio;

pub use error::{RuntimeError, RuntimeResult};
pub use shutdown::ShutdownHooks;
