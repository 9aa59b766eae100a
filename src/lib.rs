//! # Stream Ledger
//!
//! An accounting engine for linearly vesting payment streams. A sender locks
//! a deposit for a recipient, the deposit vests linearly between a start and
//! an end time, the recipient withdraws what has vested, and the sender may
//! cancel early for a pro-rata split.
//!
//! ## Design Principles
//!
//! - **Integer arithmetic**: amounts are `u128` base units; vesting floors
//! - **Conservation**: `withdrawn + refund + payout + held == deposit` per stream
//! - **Effects before payouts**: state is updated before any [`Transfer`] runs,
//!   so reentrant calls observe the new state
//! - **Escrow on create**: the deposit is collected from the sender as part
//!   of `create_stream`; there are no unfunded streams
//! - **All-or-nothing**: a failed payout or collection rolls the whole
//!   operation back, reentrant effects included
//! - **Injected capabilities**: [`Clock`] and [`Transfer`] are supplied by
//!   the caller, which keeps the engine deterministic under test
//!
//! ## Example
//!
//! ```no_run
//! use stream_ledger::{Address, Simulator};
//! use std::io::Cursor;
//!
//! let csv = "time,op,caller,stream,target,amount,start,end\n\
//!            0,fund,alice,,,1000,,\n\
//!            0,create,alice,,bob,1000,0,100\n\
//!            50,withdraw,bob,0,,,,\n";
//! let mut simulator = Simulator::new(Address::from("admin"));
//! simulator.process_csv(Cursor::new(csv)).unwrap();
//! simulator.write_output(std::io::stdout()).unwrap();
//! ```

pub mod address;
pub mod admin;
pub mod amount;
pub mod clock;
pub mod command;
pub mod engine;
pub mod error;
pub mod events;
pub mod registry;
pub mod simulator;
pub mod stream;
pub mod transfer;
pub mod vesting;

pub use address::Address;
pub use admin::AdminFacet;
pub use amount::Amount;
pub use clock::{Clock, ManualClock};
pub use command::{CommandKind, CommandRecord, ParsedCommand};
pub use engine::{Reentry, StreamEngine};
pub use error::{ReplayError, Result, StreamError, TransferError};
pub use events::{Event, EventLog};
pub use registry::StreamRegistry;
pub use simulator::Simulator;
pub use stream::{Cancellation, Stream, StreamId, Timestamp};
pub use transfer::{BalanceBook, Transfer};
pub use vesting::StreamStatus;
