//! Per-session transaction state.
//!
//! A `Transaction` buffers structured operation descriptors between `MULTI`
//! and `EXEC`/`DISCARD`. Queuing never executes anything; the buffered batch
//! is handed to `Store::run_batch` in one piece, or dropped.

use thiserror::Error;

use crate::store::StoreOp;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("transaction aborted because of previous errors")]
    Aborted,
}

/// The per-session batch buffer: `Idle` until `begin`, `Collecting` until
/// `take` or `discard`. It never outlives one commit cycle.
#[derive(Debug, Default)]
pub struct Transaction {
    collecting: bool,
    failed: bool,
    queue: Vec<StoreOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Enters `Collecting`. Any pending queue is cleared and the failure flag
    /// reset, so a repeated `MULTI` simply restarts the batch.
    pub fn begin(&mut self) {
        self.collecting = true;
        self.failed = false;
        self.queue.clear();
    }

    /// Appends an operation descriptor to the batch.
    pub fn queue(&mut self, op: StoreOp) {
        debug_assert!(self.collecting);
        self.queue.push(op);
    }

    /// Marks the batch as failed; a later `take` reports `Aborted`.
    pub fn fail(&mut self) {
        self.failed = true;
    }

    /// Consumes the batch for commit. The session's buffer is cleared and the
    /// state returns to `Idle` regardless of outcome.
    pub fn take(&mut self) -> Result<Vec<StoreOp>, TransactionError> {
        if !self.collecting {
            return Err(TransactionError::ExecWithoutMulti);
        }

        self.collecting = false;
        let queue = std::mem::take(&mut self.queue);

        if self.failed {
            self.failed = false;
            return Err(TransactionError::Aborted);
        }

        Ok(queue)
    }

    /// Drops the batch entirely and returns to `Idle`.
    pub fn discard(&mut self) -> Result<(), TransactionError> {
        if !self.collecting {
            return Err(TransactionError::DiscardWithoutMulti);
        }

        self.collecting = false;
        self.failed = false;
        self.queue.clear();
        Ok(())
    }
}
