//! Per-key signed counters.
//!
//! A tally lives in its own region under the same physical key as the entry
//! it counts for, stored as 8 big-endian bytes. An absent counter reads as
//! "never initialized": `read_or_init` seeds it with the caller's offset,
//! `adjust` treats it as zero. Every operation here is a read-modify-write
//! inside one write transaction, which the store serializes against all
//! other writers.

use crate::error::KVError;
use crate::store::{ByteRead, ByteTxn};

pub fn encode(value: i64) -> [u8; 8] {
    value.to_be_bytes()
}

pub fn decode(raw: &[u8]) -> Result<i64, KVError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        KVError::Storage(format!("tally has {} bytes, expected 8", raw.len()))
    })?;
    Ok(i64::from_be_bytes(bytes))
}

/// Current counter value, or None if it was never initialized.
pub fn peek(view: &dyn ByteRead, region: &str, key: &[u8]) -> Result<Option<i64>, KVError> {
    view.get(region, key)?.map(|raw| decode(&raw)).transpose()
}

/// Return the counter, initializing it to `offset` first if absent.
/// The offset only applies once; later calls return the stored value.
pub fn read_or_init(
    txn: &mut dyn ByteTxn,
    region: &str,
    key: &[u8],
    offset: i64,
) -> Result<i64, KVError> {
    if let Some(current) = peek(txn.as_read(), region, key)? {
        return Ok(current);
    }
    txn.put(region, key, &encode(offset))?;
    Ok(offset)
}

/// Add `delta` to the counter (absent counts as 0) and return the new value.
/// Overflow fails without writing.
pub fn adjust(txn: &mut dyn ByteTxn, region: &str, key: &[u8], delta: i64) -> Result<i64, KVError> {
    let current = peek(txn.as_read(), region, key)?.unwrap_or(0);
    let next = current
        .checked_add(delta)
        .ok_or_else(|| KVError::Validation(format!("tally overflow at {}", current)))?;
    txn.put(region, key, &encode(next))?;
    Ok(next)
}

/// Drop the counter so the next `read_or_init` applies its offset again.
pub fn reset(txn: &mut dyn ByteTxn, region: &str, key: &[u8]) -> Result<(), KVError> {
    txn.delete(region, key)
}
