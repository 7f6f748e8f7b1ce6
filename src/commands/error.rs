use thiserror::Error;

use crate::store::StoreError;
use crate::transactions::TransactionError;

/// Failures the Command Executor renders as `ERROR: <reason>` replies.
///
/// Every variant keeps the session alive; a bad command never terminates the
/// connection or the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown command")]
    UnknownCommand,
    #[error("empty command")]
    EmptyCommand,
    #[error("wrong number of arguments for '{0}'")]
    WrongArguments(&'static str),
    #[error("invalid ttl '{0}': expected seconds")]
    InvalidTtl(String),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Transaction(#[from] TransactionError),
}
