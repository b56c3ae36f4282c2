//! PhoneDrop server.
//!
//! Share files and text with devices on the local network: phones browse
//! the host filesystem, download files, drop uploads into a fixed inbox
//! folder, and exchange one shared text snippet, all over plain HTTP.
//! Devices join by scanning a QR code off the terminal.

mod config;
mod net;
mod qr;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use phonedrop_core::files::transfer::Inbox;
use phonedrop_core::text::TextStore;

use crate::config::Config;
use crate::routes::AppState;

/// PhoneDrop - share files and text with devices on your network.
#[derive(Parser, Debug)]
#[command(name = "phonedrop")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory to browse by default (overrides config)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Directory receiving uploads (overrides config)
    #[arg(long, value_name = "DIR")]
    inbox: Option<PathBuf>,

    /// Do not print the QR code banner
    #[arg(long)]
    no_qr: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration, then layer environment and CLI overrides on top.
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply_env_overrides();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(root) = &cli.root {
        config.files.browse_root = root.clone();
    }
    if let Some(inbox) = &cli.inbox {
        config.files.inbox_dir = inbox.clone();
    }
    config.validate()?;

    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.server.log_level.clone()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("PhoneDrop starting...");

    // The inbox must exist before we accept a single request; failing to
    // create it is fatal to startup, never a per-request error.
    let inbox = Inbox::open(&config.files.inbox_dir)
        .await
        .context("cannot prepare the upload inbox")?;
    info!(dir = %inbox.dir().display(), "upload inbox ready");

    let state = Arc::new(AppState {
        browse_root: config.files.browse_root.clone(),
        inbox,
        text: TextStore::new(),
    });
    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    let port = listener.local_addr()?.port();

    let url = format!("http://{}:{}", net::lan_ip(), port);
    info!(url = %url, root = %config.files.browse_root.display(), "listening");

    println!("\nPhoneDrop running at {url}");
    if !cli.no_qr {
        match qr::terminal_qr(&url) {
            Ok(code) => println!("{code}"),
            Err(err) => warn!(error = %err, "could not render the QR code"),
        }
    }
    println!("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("PhoneDrop stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal, shutting down");
}
