use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use tracing::debug;

use crate::config::Regions;
use crate::error::KVError;
use crate::store::{ByteRead, ByteStore, ByteTxn, RawEntry};

fn table(region: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(region)
}

/// RedbStore is a ByteStore backed by redb, a pure-Rust embedded
/// key-value database. Each region is a redb table with byte keys and values.
///
/// redb allows a single write transaction at a time, so `begin_write` blocks
/// while another connection holds one. Reads run on MVCC snapshots and never
/// wait for the writer.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(|e| KVError::Connection(e.to_string()))?;
        debug!("RedbStore: opened {:?}", path);
        Ok(Self { db: Arc::new(db) })
    }
}

impl ByteStore for RedbStore {
    fn prepare(&self, regions: &Regions) -> Result<(), KVError> {
        // Tables are created by opening them in a write transaction.
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Connection(e.to_string()))?;
        for region in regions.all() {
            let _table = write_txn
                .open_table(table(region))
                .map_err(|e| KVError::Connection(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Connection(e.to_string()))?;
        Ok(())
    }

    fn begin_read(&self) -> Result<Box<dyn ByteRead>, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(Box::new(RedbRead { txn: read_txn }))
    }

    fn begin_write(&self) -> Result<Box<dyn ByteTxn>, KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(Box::new(RedbTxn { txn: write_txn }))
    }
}

struct RedbRead {
    txn: ReadTransaction,
}

impl ByteRead for RedbRead {
    fn get(&self, region: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVError> {
        let table = self
            .txn
            .open_table(table(region))
            .map_err(|e| KVError::Storage(e.to_string()))?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(KVError::Storage(e.to_string())),
        }
    }

    fn scan(&self, region: &str, prefix: &[u8]) -> Result<Vec<RawEntry>, KVError> {
        let table = self
            .txn
            .open_table(table(region))
            .map_err(|e| KVError::Storage(e.to_string()))?;
        collect_prefix(&table, prefix)
    }
}

struct RedbTxn {
    txn: WriteTransaction,
}

impl ByteRead for RedbTxn {
    fn get(&self, region: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVError> {
        let table = self
            .txn
            .open_table(table(region))
            .map_err(|e| KVError::Storage(e.to_string()))?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(KVError::Storage(e.to_string())),
        }
    }

    fn scan(&self, region: &str, prefix: &[u8]) -> Result<Vec<RawEntry>, KVError> {
        let table = self
            .txn
            .open_table(table(region))
            .map_err(|e| KVError::Storage(e.to_string()))?;
        collect_prefix(&table, prefix)
    }
}

impl ByteTxn for RedbTxn {
    fn put(&mut self, region: &str, key: &[u8], value: &[u8]) -> Result<(), KVError> {
        let mut table = self
            .txn
            .open_table(table(region))
            .map_err(|e| KVError::Storage(e.to_string()))?;
        table
            .insert(key, value)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn delete(&mut self, region: &str, key: &[u8]) -> Result<(), KVError> {
        let mut table = self
            .txn
            .open_table(table(region))
            .map_err(|e| KVError::Storage(e.to_string()))?;
        table
            .remove(key)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), KVError> {
        self.txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))
    }

    fn rollback(self: Box<Self>) -> Result<(), KVError> {
        self.txn
            .abort()
            .map_err(|e| KVError::Storage(e.to_string()))
    }

    fn as_read(&self) -> &dyn ByteRead {
        self
    }
}

/// Walk `table` from `prefix` forward, stopping at the first key outside it.
fn collect_prefix<T>(table: &T, prefix: &[u8]) -> Result<Vec<RawEntry>, KVError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut results = Vec::new();
    let iter = table
        .range(prefix..)
        .map_err(|e| KVError::Storage(e.to_string()))?;

    for entry in iter {
        let entry = entry.map_err(|e| KVError::Storage(e.to_string()))?;
        let key = entry.0.value();
        if !key.starts_with(prefix) {
            break;
        }
        results.push((key.to_vec(), entry.1.value().to_vec()));
    }

    Ok(results)
}
