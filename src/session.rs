use tokio::sync::mpsc;

use crate::pubsub::{Subscriber, SUBSCRIBER_BUFFER};
use crate::transactions::Transaction;

/// Connection-scoped state the Command Executor needs: a stable identity,
/// the channel pub/sub messages are pushed through, and the session's
/// transaction buffer.
#[derive(Debug)]
pub struct Session {
    pub peer: String,
    pub pusher: mpsc::Sender<String>,
    pub transaction: Transaction,
}

impl Session {
    pub fn new(peer: String, pusher: mpsc::Sender<String>) -> Self {
        Self {
            peer,
            pusher,
            transaction: Transaction::new(),
        }
    }

    /// A detached session plus the receiving end of its push channel.
    /// Used by tests and by callers that drive the executor without a socket.
    pub fn detached(peer: &str) -> (Self, mpsc::Receiver<String>) {
        let (pusher, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        (Self::new(peer.to_string(), pusher), receiver)
    }

    /// The subscriber handle this session registers on the Pub/Sub Hub.
    pub fn subscriber(&self) -> Subscriber {
        Subscriber {
            id: self.peer.clone(),
            sender: self.pusher.clone(),
        }
    }
}
