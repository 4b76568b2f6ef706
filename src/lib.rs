pub mod bucket;
pub mod config;
pub mod conn;
pub mod error;
pub mod list;
pub mod memory;
pub mod mime;
pub mod redb;
pub mod store;
pub mod tally;
pub mod traits;
pub mod txn;

pub use config::KVConfig;
pub use conn::Connection;
pub use error::KVError;
pub use memory::MemoryStore;
pub use crate::redb::RedbStore;
pub use store::{ByteRead, ByteStore, ByteTxn};
pub use traits::PlainKV;
