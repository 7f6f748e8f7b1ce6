//! Per-connection session loop.
//!
//! Framing lives here, outside the core: one whitespace-separated command per
//! line in, one reply line out. Pushed pub/sub messages arrive through the
//! session's channel and are interleaved with replies by the same task, so
//! the socket writer has a single owner.

use std::sync::Arc;

use log::info;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::commands::Executor;
use crate::pubsub::{PubSubHub, SUBSCRIBER_BUFFER};
use crate::session::Session;
use crate::store::Store;

pub async fn handle_connection(
    stream: TcpStream,
    peer: String,
    store: Arc<Store>,
    hub: Arc<PubSubHub>,
) -> tokio::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let (push_tx, mut push_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
    let mut session = Session::new(peer.clone(), push_tx);
    let executor = Executor::new(store, hub);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("{} disconnected", peer);
                    break;
                };

                let parts: Vec<String> =
                    line.split_whitespace().map(str::to_string).collect();
                if parts.is_empty() {
                    continue;
                }
                let quitting = parts[0].eq_ignore_ascii_case("quit");

                let reply = executor.execute(&parts, &mut session).await;
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;

                if quitting {
                    info!("{} quit", peer);
                    break;
                }
            }
            Some(message) = push_rx.recv() => {
                writer.write_all(message.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
    }

    Ok(())
}
