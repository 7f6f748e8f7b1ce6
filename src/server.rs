//! Startup configuration and the TCP accept loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::connection::handle_connection;
use crate::pubsub::PubSubHub;
use crate::store::Store;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid command line flag value")]
    InvalidCommandLineFlagValue,
}

/// Service endpoint configuration, supplied by the startup collaborator.
#[derive(Debug, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval_secs: u64,
}

impl ServerConfig {
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);

        let mut host: Option<String> = None;
        let mut port: Option<u16> = None;
        let mut snapshot_path: Option<PathBuf> = None;
        let mut snapshot_interval_secs: Option<u64> = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--host" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    };
                    host = Some(value);
                }
                "--port" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    };
                    let port_number = value
                        .parse::<u16>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;
                    if port_number == 0 {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }
                    port = Some(port_number);
                }
                "--snapshot" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    };
                    snapshot_path = Some(PathBuf::from(value));
                }
                "--snapshot-interval" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    };
                    let secs = value
                        .parse::<u64>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;
                    snapshot_interval_secs = Some(secs);
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(ServerConfig {
            host: host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: port.unwrap_or(6379),
            snapshot_path,
            snapshot_interval_secs: snapshot_interval_secs.unwrap_or(0),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}

/// Binds the endpoint and serves connections until the listener fails.
pub async fn run(
    config: &ServerConfig,
    store: Arc<Store>,
    hub: Arc<PubSubHub>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.addr()).await?;
    info!("listening on {}", config.addr());
    serve(listener, store, hub).await
}

/// Accept loop over an already-bound listener. One tokio task per
/// connection; all tasks share the one store and hub.
pub async fn serve(
    listener: TcpListener,
    store: Arc<Store>,
    hub: Arc<PubSubHub>,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("accepted connection from {}", peer);

        let store = Arc::clone(&store);
        let hub = Arc::clone(&hub);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer.to_string(), store, hub).await {
                error!("connection {} failed: {}", peer, e);
            }
        });
    }
}
