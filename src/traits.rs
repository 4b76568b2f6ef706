use crate::error::KVError;

/// PlainKV is a plain key-value store layered on an existing database
/// engine. It has no storage of its own; see `ByteStore` for the engine side.
///
/// Keys live in buckets (default `"default"`). Besides the value, each key
/// may carry a MIME string and a tally counter; the three are independent.
/// Mutations made outside `begin`/`commit` are committed one by one.
pub trait PlainKV {
    /// Open the connection to the database. No-op if already open.
    fn open(&mut self) -> Result<(), KVError>;

    /// Begin a transaction. Fails with `KVError::State` if one is active.
    fn begin(&mut self) -> Result<(), KVError>;

    /// Get the value of a key. Returns `KVError::NotFound` if absent.
    fn get(&self, key: &str) -> Result<Vec<u8>, KVError>;

    /// Set the value of a key. An empty value is stored as such.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Select the bucket subsequent operations work in.
    fn set_bucket(&mut self, bucket: &str) -> Result<(), KVError>;

    /// Delete a key. Deleting an absent key succeeds. The key's MIME record
    /// and tally are left alone.
    fn del(&mut self, key: &str) -> Result<(), KVError>;

    /// Get the MIME of a key. Returns `KVError::NotFound` if never set.
    fn get_mime(&self, key: &str) -> Result<String, KVError>;

    /// Set the MIME of a key.
    fn set_mime(&mut self, key: &str, mime: &str) -> Result<(), KVError>;

    /// List keys of the current bucket matching a glob pattern.
    fn list_keys(&self, pattern: &str) -> Result<Vec<String>, KVError>;

    /// Current tally of a key. A tally that was never initialized starts at
    /// `offset`; later calls ignore `offset`.
    fn tally(&mut self, key: &str, offset: i64) -> Result<i64, KVError>;

    /// Increment the tally and return the new value.
    fn tally_incr(&mut self, key: &str) -> Result<i64, KVError>;

    /// Decrement the tally and return the new value.
    fn tally_decr(&mut self, key: &str) -> Result<i64, KVError>;

    /// Reset the tally to the never-initialized state.
    fn tally_reset(&mut self, key: &str) -> Result<(), KVError>;

    fn commit(&mut self) -> Result<(), KVError>;

    fn rollback(&mut self) -> Result<(), KVError>;

    /// Close the connection. Fails with `KVError::State` while a
    /// transaction is active.
    fn close(&mut self) -> Result<(), KVError>;
}
