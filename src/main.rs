use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};

use rockpool::pubsub::PubSubHub;
use rockpool::server::{self, ServerConfig};
use rockpool::snapshot::{self, SnapshotError};
use rockpool::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ServerConfig::new(std::env::args())?;
    let store = Arc::new(Store::new());
    let hub = Arc::new(PubSubHub::new());

    if let Some(path) = config.snapshot_path() {
        match snapshot::load(&store, path).await {
            Ok(()) => info!(
                "restored {} keys from {}",
                store.len().await,
                path.display()
            ),
            Err(SnapshotError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!("no snapshot at {}, starting empty", path.display());
            }
            Err(e) => return Err(e.into()),
        }
    }

    spawn_expiration_sweeper(Arc::clone(&store));
    spawn_periodic_snapshot(&config, Arc::clone(&store));

    tokio::select! {
        result = server::run(&config, Arc::clone(&store), hub) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            if let Some(path) = config.snapshot_path() {
                snapshot::save(&store, path).await?;
                info!("saved snapshot to {}", path.display());
            }
        }
    }

    Ok(())
}

/// Background purge of expired entries. Shares the keyspace mutex with
/// foreground operations, so it never races a concurrent write.
fn spawn_expiration_sweeper(store: Arc<Store>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tick.tick().await;
            let removed = store.sweep_expired().await;
            if removed > 0 {
                debug!("expiration sweep removed {} keys", removed);
            }
        }
    });
}

/// Periodic snapshot save, enabled by `--snapshot` plus a non-zero
/// `--snapshot-interval`. A failed save is logged and retried next tick.
fn spawn_periodic_snapshot(config: &ServerConfig, store: Arc<Store>) {
    let Some(path) = config.snapshot_path() else {
        return;
    };
    if config.snapshot_interval_secs == 0 {
        return;
    }

    let path = path.to_path_buf();
    let interval = Duration::from_secs(config.snapshot_interval_secs);

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.tick().await; // the first tick fires immediately
        loop {
            tick.tick().await;
            match snapshot::save(&store, &path).await {
                Ok(()) => debug!("saved snapshot to {}", path.display()),
                Err(e) => error!("snapshot save failed: {}", e),
            }
        }
    });
}
