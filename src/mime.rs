//! MIME sidecar: one content-type string per key, in its own region.
//!
//! Records are keyed exactly like entries but have an independent
//! lifecycle. A MIME record may exist without an entry and vice versa.

use crate::error::KVError;
use crate::store::{ByteRead, ByteTxn};

/// Stored MIME string for `key`, or None if none was ever set.
pub fn get(view: &dyn ByteRead, region: &str, key: &[u8]) -> Result<Option<String>, KVError> {
    match view.get(region, key)? {
        Some(raw) => String::from_utf8(raw)
            .map(Some)
            .map_err(|e| KVError::Storage(format!("mime is not utf-8: {}", e))),
        None => Ok(None),
    }
}

/// Store `mime` as given; the format is not checked.
pub fn set(txn: &mut dyn ByteTxn, region: &str, key: &[u8], mime: &str) -> Result<(), KVError> {
    txn.put(region, key, mime.as_bytes())
}
