use crate::config::Regions;
use crate::error::KVError;

/// A raw (key, value) pair as held by a region.
pub type RawEntry = (Vec<u8>, Vec<u8>);

/// ByteStore is the transactional byte-oriented primitive the plain KV layer
/// runs on. Each implementation adapts one underlying engine.
///
/// Keys and values are opaque bytes living in named regions. At most one
/// write transaction is live at a time per store: `begin_write` blocks until
/// the current writer commits or rolls back.
pub trait ByteStore: Send + Sync {
    /// Make sure every region exists. Safe to call more than once.
    fn prepare(&self, regions: &Regions) -> Result<(), KVError>;

    /// Start a read-only view of committed data.
    fn begin_read(&self) -> Result<Box<dyn ByteRead>, KVError>;

    /// Start a write transaction.
    fn begin_write(&self) -> Result<Box<dyn ByteTxn>, KVError>;
}

/// Read access to one or more regions.
pub trait ByteRead {
    /// Get the value stored under `key`. Returns None if absent.
    fn get(&self, region: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVError>;

    /// All pairs whose key starts with `prefix`, sorted by key.
    fn scan(&self, region: &str, prefix: &[u8]) -> Result<Vec<RawEntry>, KVError>;
}

/// A write transaction. Changes become visible to other readers only after
/// `commit`; `rollback` discards all of them.
pub trait ByteTxn: ByteRead {
    fn put(&mut self, region: &str, key: &[u8], value: &[u8]) -> Result<(), KVError>;

    /// Remove `key`. No-op if the key does not exist.
    fn delete(&mut self, region: &str, key: &[u8]) -> Result<(), KVError>;

    fn commit(self: Box<Self>) -> Result<(), KVError>;

    fn rollback(self: Box<Self>) -> Result<(), KVError>;

    /// View this transaction as a reader (sees its own uncommitted writes).
    fn as_read(&self) -> &dyn ByteRead;
}
