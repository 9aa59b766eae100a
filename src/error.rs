//! Error types for the stream ledger.

use crate::address::Address;
use crate::amount::Amount;
use crate::stream::StreamId;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors raised by stream operations.
///
/// Every variant except `TransferFailed` is detected before the ledger is
/// touched. `TransferFailed` is only returned after the operation has been
/// rolled back to its pre-call state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// No stream with this id
    #[error("stream {id} not found")]
    NotFound { id: StreamId },

    /// Caller does not hold the role the operation requires
    #[error("caller {caller} is not authorized for this operation")]
    Unauthorized { caller: Address },

    /// Zero amount, null address or an empty time window
    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),

    /// Withdrawal from a canceled stream
    #[error("stream {id} is inactive")]
    Inactive { id: StreamId },

    /// Cancellation of a canceled stream
    #[error("stream {id} is already inactive")]
    AlreadyInactive { id: StreamId },

    /// Nothing has vested since the last withdrawal
    #[error("nothing is due on stream {id}")]
    NothingDue { id: StreamId },

    /// An outbound payment could not be delivered
    #[error("transfer failed: {0}")]
    TransferFailed(#[source] TransferError),
}

/// Failures reported by a [`Transfer`](crate::transfer::Transfer) primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The payee refused the payment
    #[error("payment to {to} was rejected")]
    Rejected { to: Address },

    /// The payer cannot cover the amount
    #[error("{account} holds {available}, needs {needed}")]
    InsufficientFunds {
        account: Address,
        needed: Amount,
        available: Amount,
    },
}

/// Errors that stop a scenario replay as a whole.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing input file argument
    #[error("Missing input file argument. Usage: stream-ledger <scenario.csv> [--balances]")]
    MissingArgument,
}
