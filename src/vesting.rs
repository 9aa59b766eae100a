//! Vesting math.
//!
//! Pure functions of a stream and a timestamp. Nothing here reads a clock or
//! touches state, so every view can be evaluated at arbitrary times.

use crate::amount::Amount;
use crate::stream::{Stream, Timestamp};

/// Lifecycle phase of a stream at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Start time not reached yet.
    Pending,
    /// Vesting in progress.
    Streaming,
    /// Fully vested, recipient has not withdrawn everything.
    Settled,
    /// Recipient withdrew the whole deposit.
    Depleted,
    /// Sender canceled the stream.
    Canceled,
}

/// Amount vested at `now`: zero up to `start_time`, the full deposit from
/// `end_time` on, and the floored linear interpolation in between.
pub fn vested_amount(stream: &Stream, now: Timestamp) -> Amount {
    if now <= stream.start_time {
        return Amount::ZERO;
    }
    if now >= stream.end_time {
        return stream.deposit;
    }

    let elapsed = now - stream.start_time;
    Amount::new(mul_div_floor(
        stream.deposit.units(),
        elapsed,
        stream.duration(),
    ))
}

/// Amount the recipient may withdraw at `now`. Zero once canceled.
pub fn withdrawable(stream: &Stream, now: Timestamp) -> Amount {
    if !stream.is_active {
        return Amount::ZERO;
    }
    vested_amount(stream, now).saturating_sub(stream.withdrawn)
}

/// Amount the sender would get back by canceling at `now`. Zero once canceled.
pub fn refundable(stream: &Stream, now: Timestamp) -> Amount {
    if !stream.is_active {
        return Amount::ZERO;
    }
    stream.deposit.saturating_sub(vested_amount(stream, now))
}

pub fn status(stream: &Stream, now: Timestamp) -> StreamStatus {
    if !stream.is_active {
        StreamStatus::Canceled
    } else if now < stream.start_time {
        StreamStatus::Pending
    } else if stream.withdrawn == stream.deposit {
        StreamStatus::Depleted
    } else if now >= stream.end_time {
        StreamStatus::Settled
    } else {
        StreamStatus::Streaming
    }
}

/// `floor(value * numerator / denominator)` for `numerator < denominator`.
///
/// Splits `value` into `q * denominator + r` so neither partial product can
/// overflow: `q * numerator < value` and `r * numerator < 2^128`.
fn mul_div_floor(value: u128, numerator: u64, denominator: u64) -> u128 {
    debug_assert!(numerator < denominator);
    let numerator = u128::from(numerator);
    let denominator = u128::from(denominator);

    let q = value / denominator;
    let r = value % denominator;
    q * numerator + r * numerator / denominator
}
