//! In-memory byte store for tests and ephemeral data.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, Mutex, RwLock};

use crate::config::Regions;
use crate::error::KVError;
use crate::store::{ByteRead, ByteStore, ByteTxn, RawEntry};

type Region = BTreeMap<Vec<u8>, Vec<u8>>;
type Data = Arc<RwLock<HashMap<String, Region>>>;

/// An in-memory ByteStore backed by one BTreeMap per region.
///
/// Write transactions buffer their changes and apply them under a single
/// write lock at commit, so readers never observe half of a transaction.
/// Only one write transaction runs at a time; others wait at the gate.
#[derive(Clone)]
pub struct MemoryStore {
    data: Data,
    gate: Arc<WriterGate>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            gate: Arc::new(WriterGate::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStore for MemoryStore {
    fn prepare(&self, regions: &Regions) -> Result<(), KVError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| KVError::Connection(e.to_string()))?;
        for region in regions.all() {
            data.entry(region.to_string()).or_default();
        }
        Ok(())
    }

    fn begin_read(&self) -> Result<Box<dyn ByteRead>, KVError> {
        Ok(Box::new(MemoryRead {
            data: self.data.clone(),
        }))
    }

    fn begin_write(&self) -> Result<Box<dyn ByteTxn>, KVError> {
        let permit = WriterGate::acquire(&self.gate)?;
        Ok(Box::new(MemoryTxn {
            _permit: permit,
            data: self.data.clone(),
            pending: BTreeMap::new(),
        }))
    }
}

/// Admits one writer at a time. Held for the whole life of a MemoryTxn.
#[derive(Default)]
struct WriterGate {
    busy: Mutex<bool>,
    released: Condvar,
}

impl WriterGate {
    fn acquire(gate: &Arc<WriterGate>) -> Result<WriterPermit, KVError> {
        let mut busy = gate
            .busy
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        while *busy {
            busy = gate
                .released
                .wait(busy)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        *busy = true;
        Ok(WriterPermit { gate: gate.clone() })
    }
}

struct WriterPermit {
    gate: Arc<WriterGate>,
}

impl Drop for WriterPermit {
    fn drop(&mut self) {
        // A poisoned gate still has to be reopened for the next writer.
        let mut busy = match self.gate.busy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *busy = false;
        self.gate.released.notify_one();
    }
}

fn read_get(data: &Data, region: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVError> {
    let data = data.read().map_err(|e| KVError::Storage(e.to_string()))?;
    let table = data
        .get(region)
        .ok_or_else(|| KVError::Storage(format!("region {:?} does not exist", region)))?;
    Ok(table.get(key).cloned())
}

fn read_scan(data: &Data, region: &str, prefix: &[u8]) -> Result<Vec<RawEntry>, KVError> {
    let data = data.read().map_err(|e| KVError::Storage(e.to_string()))?;
    let table = data
        .get(region)
        .ok_or_else(|| KVError::Storage(format!("region {:?} does not exist", region)))?;

    let mut results = Vec::new();
    for (key, value) in table.range(prefix.to_vec()..) {
        if !key.starts_with(prefix) {
            break;
        }
        results.push((key.clone(), value.clone()));
    }
    Ok(results)
}

struct MemoryRead {
    data: Data,
}

impl ByteRead for MemoryRead {
    fn get(&self, region: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVError> {
        read_get(&self.data, region, key)
    }

    fn scan(&self, region: &str, prefix: &[u8]) -> Result<Vec<RawEntry>, KVError> {
        read_scan(&self.data, region, prefix)
    }
}

/// Buffered write transaction. `None` in `pending` is a tombstone.
struct MemoryTxn {
    _permit: WriterPermit,
    data: Data,
    pending: BTreeMap<(String, Vec<u8>), Option<Vec<u8>>>,
}

impl ByteRead for MemoryTxn {
    fn get(&self, region: &str, key: &[u8]) -> Result<Option<Vec<u8>>, KVError> {
        // Buffered writes shadow committed data.
        if let Some(value) = self.pending.get(&(region.to_string(), key.to_vec())) {
            return Ok(value.clone());
        }
        read_get(&self.data, region, key)
    }

    fn scan(&self, region: &str, prefix: &[u8]) -> Result<Vec<RawEntry>, KVError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            read_scan(&self.data, region, prefix)?.into_iter().collect();

        let start = (region.to_string(), prefix.to_vec());
        for ((pending_region, key), value) in self.pending.range(start..) {
            if pending_region != region || !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }
}

impl ByteTxn for MemoryTxn {
    fn put(&mut self, region: &str, key: &[u8], value: &[u8]) -> Result<(), KVError> {
        self.pending
            .insert((region.to_string(), key.to_vec()), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, region: &str, key: &[u8]) -> Result<(), KVError> {
        self.pending.insert((region.to_string(), key.to_vec()), None);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), KVError> {
        let MemoryTxn { _permit, data, pending } = *self;
        let mut data = data.write().map_err(|e| KVError::Storage(e.to_string()))?;

        // Check every region first so a bad one leaves nothing applied.
        for (region, _) in pending.keys() {
            if !data.contains_key(region) {
                return Err(KVError::Storage(format!(
                    "region {:?} does not exist",
                    region
                )));
            }
        }

        for ((region, key), value) in pending {
            if let Some(table) = data.get_mut(&region) {
                match value {
                    Some(value) => {
                        table.insert(key, value);
                    }
                    None => {
                        table.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), KVError> {
        Ok(())
    }

    fn as_read(&self) -> &dyn ByteRead {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KVConfig;
    use std::thread;

    fn prepared() -> MemoryStore {
        let store = MemoryStore::new();
        store.prepare(&KVConfig::default().regions()).unwrap();
        store
    }

    #[test]
    fn test_basic_operations() {
        let store = prepared();

        let mut txn = store.begin_write().unwrap();
        txn.put("KeyValueTbl", b"key1", b"value1").unwrap();

        // Not visible outside the transaction until commit.
        let read = store.begin_read().unwrap();
        assert_eq!(read.get("KeyValueTbl", b"key1").unwrap(), None);
        assert_eq!(
            txn.get("KeyValueTbl", b"key1").unwrap(),
            Some(b"value1".to_vec())
        );
        txn.commit().unwrap();
        assert_eq!(
            read.get("KeyValueTbl", b"key1").unwrap(),
            Some(b"value1".to_vec())
        );

        let mut txn = store.begin_write().unwrap();
        txn.delete("KeyValueTbl", b"key1").unwrap();
        assert_eq!(txn.get("KeyValueTbl", b"key1").unwrap(), None);
        txn.commit().unwrap();
        assert_eq!(read.get("KeyValueTbl", b"key1").unwrap(), None);
    }

    #[test]
    fn test_rollback_discards() {
        let store = prepared();

        let mut txn = store.begin_write().unwrap();
        txn.put("KeyValueTbl", b"key1", b"value1").unwrap();
        txn.put("KeyValueMimeTbl", b"key1", b"text/plain").unwrap();
        txn.rollback().unwrap();

        let read = store.begin_read().unwrap();
        assert_eq!(read.get("KeyValueTbl", b"key1").unwrap(), None);
        assert_eq!(read.get("KeyValueMimeTbl", b"key1").unwrap(), None);
    }

    #[test]
    fn test_scan_merges_pending() {
        let store = prepared();

        let mut txn = store.begin_write().unwrap();
        txn.put("KeyValueTbl", b"prefix:a", b"1").unwrap();
        txn.put("KeyValueTbl", b"prefix:b", b"2").unwrap();
        txn.put("KeyValueTbl", b"other:c", b"3").unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin_write().unwrap();
        txn.delete("KeyValueTbl", b"prefix:a").unwrap();
        txn.put("KeyValueTbl", b"prefix:c", b"4").unwrap();
        txn.put("KeyValueMimeTbl", b"prefix:z", b"x").unwrap();

        let results = txn.scan("KeyValueTbl", b"prefix:").unwrap();
        assert_eq!(
            results,
            vec![
                (b"prefix:b".to_vec(), b"2".to_vec()),
                (b"prefix:c".to_vec(), b"4".to_vec()),
            ]
        );
    }

    #[test]
    fn test_unknown_region_fails() {
        let store = prepared();
        let read = store.begin_read().unwrap();
        assert!(matches!(
            read.get("NoSuchTbl", b"k"),
            Err(KVError::Storage(_))
        ));

        let mut txn = store.begin_write().unwrap();
        txn.put("KeyValueTbl", b"k", b"v").unwrap();
        txn.put("NoSuchTbl", b"k", b"v").unwrap();
        assert!(txn.commit().is_err());
        assert_eq!(read.get("KeyValueTbl", b"k").unwrap(), None);
    }

    #[test]
    fn test_writers_are_serialized() {
        let store = prepared();
        let mut handles = Vec::new();

        for _ in 0..4 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let mut txn = store.begin_write().unwrap();
                    let current = txn
                        .get("KeyValueTbl", b"n")
                        .unwrap()
                        .map(|v| u64::from_be_bytes(v.try_into().unwrap()))
                        .unwrap_or(0);
                    txn.put("KeyValueTbl", b"n", &(current + 1).to_be_bytes())
                        .unwrap();
                    txn.commit().unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let read = store.begin_read().unwrap();
        let value = read.get("KeyValueTbl", b"n").unwrap().unwrap();
        assert_eq!(u64::from_be_bytes(value.try_into().unwrap()), 200);
    }
}
