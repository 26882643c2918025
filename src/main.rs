mod commands;
mod config;
mod gshare_client;
mod session;
mod transport;
mod types;
mod view;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::ControlApi;
use crate::config::Config;
use crate::gshare_client::GshareClient;
use crate::session::{FrontEvent, ViewSession};
use crate::transport::{TransportSupervisor, UpdateSource};
use crate::view::surface::JsonlSurface;

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout carries the render-op stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().await;
    let client = match GshareClient::connect(&config) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            error!(error = ?err, "Failed to initialize server client");
            std::process::exit(1);
        }
    };

    let source: Arc<dyn UpdateSource> = client.clone();
    let control: Arc<dyn ControlApi> = client;

    let (transport_tx, transport_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor = TransportSupervisor::spawn(
        Arc::clone(&source),
        Duration::from_secs(config.poll_interval_secs),
        config.auto_update_log,
        transport_tx,
        shutdown_rx,
    );

    let (front_tx, front_rx) = mpsc::channel(16);
    spawn_front_reader(front_tx.clone());

    let ctrl_front = front_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_front.send(FrontEvent::Shutdown).await;
        }
    });

    info!("Dashboard agent started");
    let session = ViewSession::new(&config, source, control, JsonlSurface::stdout());
    session.run(transport_rx, front_rx, shutdown_tx).await;

    if let Err(err) = supervisor.await {
        warn!(error = ?err, "Transport supervisor ended abnormally");
    }
    info!("Dashboard agent stopped");
}

/// Forward front events from stdin, one JSON object per line. EOF means the
/// front went away; the session tears down.
fn spawn_front_reader(tx: mpsc::Sender<FrontEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<FrontEvent>(trimmed) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            warn!(error = ?err, line = %trimmed, "Ignoring malformed front event")
                        }
                    }
                }
                Ok(None) => {
                    let _ = tx.send(FrontEvent::Shutdown).await;
                    return;
                }
                Err(err) => {
                    warn!(error = ?err, "Front input error");
                    let _ = tx.send(FrontEvent::Shutdown).await;
                    return;
                }
            }
        }
    });
}
