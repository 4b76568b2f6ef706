use std::sync::Arc;

use tracing::debug;

use crate::bucket::{self, BucketRouter};
use crate::config::{KVConfig, Regions};
use crate::error::KVError;
use crate::list::{self, KeyPattern};
use crate::mime;
use crate::store::ByteStore;
use crate::tally;
use crate::traits::PlainKV;
use crate::txn::TxnCoordinator;

fn not_open() -> KVError {
    KVError::State("connection is not open".to_string())
}

/// Connection is a PlainKV session over a shared ByteStore.
///
/// Bucket selection and the active transaction are local to the connection.
/// Several connections may share one store; their writes are serialized by
/// the store, so a connection holding an open transaction makes the others'
/// writes wait until it commits or rolls back.
pub struct Connection {
    store: Arc<dyn ByteStore>,
    config: KVConfig,
    regions: Regions,
    /// Set while the connection is open.
    router: Option<BucketRouter>,
    txn: TxnCoordinator,
}

impl Connection {
    /// Create a closed connection. Call `open` before use.
    pub fn new(store: Arc<dyn ByteStore>, config: KVConfig) -> Self {
        let regions = config.regions();
        Self {
            store,
            config,
            regions,
            router: None,
            txn: TxnCoordinator::new(),
        }
    }

    /// Open a connection on the store `config` points at. Connections made
    /// from one configuration (or its clones) share that store.
    pub fn connect(config: KVConfig) -> Result<Self, KVError> {
        let store = config.open_store()?;
        let mut conn = Self::new(store, config);
        conn.open()?;
        Ok(conn)
    }

    pub fn config(&self) -> &KVConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.router.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_active()
    }

    /// Name of the currently selected bucket.
    pub fn bucket(&self) -> Result<&str, KVError> {
        self.router.as_ref().map(|r| r.current()).ok_or_else(not_open)
    }

    /// Buckets that have received writes, sorted by name.
    pub fn list_buckets(&self) -> Result<Vec<String>, KVError> {
        if self.router.is_none() {
            return Err(not_open());
        }
        let regions = &self.regions;
        self.txn
            .read(self.store.as_ref(), |view| bucket::recorded(view, &regions.buckets))
    }

    /// Remove every entry, MIME record and tally of `name`, and the bucket
    /// itself from the index. The current bucket selection is not changed.
    pub fn drop_bucket(&mut self, name: &str) -> Result<(), KVError> {
        if self.router.is_none() {
            return Err(not_open());
        }
        bucket::validate_bucket(name)?;

        let prefix = bucket::compose(name, "");
        let regions = &self.regions;
        let removed = self.txn.write(self.store.as_ref(), |txn| {
            let mut removed = 0;
            for region in regions.bucketed() {
                for (physical, _) in txn.scan(region, &prefix)? {
                    txn.delete(region, &physical)?;
                    removed += 1;
                }
            }
            txn.delete(&regions.buckets, name.as_bytes())?;
            Ok(removed)
        })?;

        debug!("Connection: dropped bucket {:?} ({} records)", name, removed);
        Ok(())
    }
}

impl PlainKV for Connection {
    fn open(&mut self) -> Result<(), KVError> {
        if self.router.is_some() {
            return Ok(());
        }
        self.store
            .prepare(&self.regions)
            .map_err(|e| match e {
                KVError::Connection(_) => e,
                other => KVError::Connection(other.to_string()),
            })?;
        self.router = Some(BucketRouter::new(&self.config.default_bucket)?);
        debug!(
            "Connection: opened (table {:?}, bucket {:?})",
            self.regions.entries, self.config.default_bucket
        );
        Ok(())
    }

    fn begin(&mut self) -> Result<(), KVError> {
        if self.router.is_none() {
            return Err(not_open());
        }
        self.txn.begin(self.store.as_ref())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        self.txn
            .read(self.store.as_ref(), |view| view.get(&regions.entries, &physical))?
            .ok_or_else(|| {
                KVError::NotFound(format!("key {:?} in bucket {:?}", key, router.current()))
            })
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        self.txn.write(self.store.as_ref(), |txn| {
            txn.put(&regions.entries, &physical, value)?;
            bucket::record(txn, &regions.buckets, router.current())
        })
    }

    fn set_bucket(&mut self, bucket: &str) -> Result<(), KVError> {
        let router = self.router.as_mut().ok_or_else(not_open)?;
        router.select(bucket)
    }

    fn del(&mut self, key: &str) -> Result<(), KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        self.txn
            .write(self.store.as_ref(), |txn| txn.delete(&regions.entries, &physical))
    }

    fn get_mime(&self, key: &str) -> Result<String, KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        self.txn
            .read(self.store.as_ref(), |view| mime::get(view, &regions.mime, &physical))?
            .ok_or_else(|| {
                KVError::NotFound(format!(
                    "mime of key {:?} in bucket {:?}",
                    key,
                    router.current()
                ))
            })
    }

    fn set_mime(&mut self, key: &str, mime_type: &str) -> Result<(), KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        self.txn.write(self.store.as_ref(), |txn| {
            mime::set(txn, &regions.mime, &physical, mime_type)?;
            bucket::record(txn, &regions.buckets, router.current())
        })
    }

    fn list_keys(&self, pattern: &str) -> Result<Vec<String>, KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let pattern = KeyPattern::new(pattern)?;
        let regions = &self.regions;

        self.txn.read(self.store.as_ref(), |view| {
            list::list_keys(view, &regions.entries, router, &pattern)
        })
    }

    fn tally(&mut self, key: &str, offset: i64) -> Result<i64, KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        // Existing counters are served from a read view; only a missing one
        // needs the writer.
        let current = self
            .txn
            .read(self.store.as_ref(), |view| tally::peek(view, &regions.tally, &physical))?;
        if let Some(value) = current {
            return Ok(value);
        }

        self.txn.write(self.store.as_ref(), |txn| {
            let value = tally::read_or_init(txn, &regions.tally, &physical, offset)?;
            bucket::record(txn, &regions.buckets, router.current())?;
            Ok(value)
        })
    }

    fn tally_incr(&mut self, key: &str) -> Result<i64, KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        self.txn.write(self.store.as_ref(), |txn| {
            let value = tally::adjust(txn, &regions.tally, &physical, 1)?;
            bucket::record(txn, &regions.buckets, router.current())?;
            Ok(value)
        })
    }

    fn tally_decr(&mut self, key: &str) -> Result<i64, KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        self.txn.write(self.store.as_ref(), |txn| {
            let value = tally::adjust(txn, &regions.tally, &physical, -1)?;
            bucket::record(txn, &regions.buckets, router.current())?;
            Ok(value)
        })
    }

    fn tally_reset(&mut self, key: &str) -> Result<(), KVError> {
        let router = self.router.as_ref().ok_or_else(not_open)?;
        let physical = router.compose(key);
        let regions = &self.regions;

        self.txn
            .write(self.store.as_ref(), |txn| tally::reset(txn, &regions.tally, &physical))
    }

    fn commit(&mut self) -> Result<(), KVError> {
        if self.router.is_none() {
            return Err(not_open());
        }
        self.txn.commit()
    }

    fn rollback(&mut self) -> Result<(), KVError> {
        if self.router.is_none() {
            return Err(not_open());
        }
        self.txn.rollback()
    }

    fn close(&mut self) -> Result<(), KVError> {
        if self.router.is_none() {
            return Ok(());
        }
        if self.txn.is_active() {
            return Err(KVError::State(
                "cannot close with an active transaction".to_string(),
            ));
        }
        self.router = None;
        debug!("Connection: closed");
        Ok(())
    }
}
