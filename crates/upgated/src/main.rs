//! upgated — hosts an upgate app behind the gateway proxy protocol.
//!
//! Reads `up.toml`, builds the configured handler, and either serves events
//! from the platform shim or runs a single event from a file.
//!
//! # Usage
//!
//! ```text
//! upgated serve --config up.toml
//! upgated invoke --event event.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn, Instrument};
use upgate_core::{HandlerKind, LogFields, UpConfig};
use upgate_proxy::handlers::{
    Echo, ErrorPages, Gzip, HeaderRules, Headers, Pages, Ping, PoweredBy, StaticFiles,
    HEADERS_FILE,
};
use upgate_proxy::{Dispatcher, Handler};
use upgate_runtime::logging::{init_tracing, root_span};
use upgate_runtime::stdio::serve_stdio;
use upgate_runtime::ShutdownHooks;

#[derive(Parser)]
#[command(name = "upgated", about = "upgate app host", version)]
struct Cli {
    /// Path to the app configuration.
    #[arg(long, global = true, default_value = "up.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve gateway events from stdin until it closes or a signal arrives.
    Serve,
    /// Run one gateway event from a JSON file and print the result.
    Invoke {
        /// File holding the gateway event.
        #[arg(long)]
        event: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = UpConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&config.logs)?;

    let mut fields = LogFields::from_env();
    if fields.stage.is_empty() {
        fields.stage = config.stage.clone();
    }
    if fields.app.is_empty() {
        fields.app = config.name.clone();
    }
    let span = root_span(&fields);

    let root = cli.config.parent().unwrap_or(Path::new("."));
    let handler = build_handler(&config, root).context("building handler")?;
    let dispatcher = Arc::new(Dispatcher::from_arc(handler));

    match cli.command {
        Command::Serve => run_serve(&config, dispatcher).instrument(span).await,
        Command::Invoke { event } => run_invoke(&event, &dispatcher).instrument(span).await,
    }
}

/// Wrap the configured handler, innermost first: powered-by, header rules,
/// error pages, gzip, then ping.
fn build_handler(config: &UpConfig, root: &Path) -> anyhow::Result<Arc<dyn Handler>> {
    let handler = &config.handler;
    let inner: Box<dyn Handler> = match handler.kind {
        HandlerKind::Echo => Box::new(Echo),
        HandlerKind::Static => Box::new(StaticFiles::new(&handler.dir)),
    };
    let mut chain: Box<dyn Handler> = Box::new(PoweredBy::new("upgate", inner));

    let rules = HeaderRules::from_file(&root.join(HEADERS_FILE))?
        .merge(HeaderRules::new(config.headers.clone()));
    if !rules.is_empty() {
        chain = Box::new(Headers::new(rules, chain));
    }

    if config.error_pages.enable {
        let pages = Pages::load(&config.error_pages.dir).context("loading error pages")?;
        let variables = config.error_pages.variables.clone();
        chain = Box::new(ErrorPages::new(pages, variables, chain));
    }

    if handler.gzip {
        chain = Box::new(Gzip::new(chain));
    }

    if handler.ping {
        Ok(Arc::new(Ping::new(chain)))
    } else {
        Ok(Arc::new(chain))
    }
}

async fn run_serve(config: &UpConfig, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    info!(
        name = %config.name,
        handler = ?config.handler.kind,
        stage = %config.stage,
        "upgated starting"
    );

    let (stop_tx, stop_rx) = watch::channel(false);

    let hooks = Arc::new(ShutdownHooks::new());
    hooks.add("log-shutdown", || {
        info!("upgated stopped");
        Ok(())
    });
    hooks.add("stop-transport", move || {
        stop_tx
            .send(true)
            .context("event transport already stopped")?;
        Ok(())
    });

    let signal_hooks = Arc::clone(&hooks);
    let signals = tokio::spawn(async move {
        match signal_hooks.wait_for_signal().await {
            Ok(failures) if failures > 0 => warn!(failures, "shutdown hooks reported failures"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "cannot listen for shutdown signals"),
        }
    });

    let replies = serve_stdio(dispatcher, stop_rx).await?;
    info!(replies, "event transport finished, shutting down");

    signals.abort();
    hooks.run();
    Ok(())
}

async fn run_invoke(path: &Path, dispatcher: &Dispatcher) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let event: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;

    let output = dispatcher.handle_value(event)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
