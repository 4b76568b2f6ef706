use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use tracing::debug;

use crate::error::KVError;
use crate::memory::MemoryStore;
use crate::redb::RedbStore;
use crate::store::ByteStore;

/// Default region (table) holding primary entries.
pub const DEFAULT_ENTRY_TABLE: &str = "KeyValueTbl";
pub const DEFAULT_MIME_TABLE: &str = "KeyValueMimeTbl";
pub const DEFAULT_TALLY_TABLE: &str = "KeyValueTallyTbl";
pub const DEFAULT_BUCKET_TABLE: &str = "KeyValueBucketTbl";
/// Bucket selected right after `open`.
pub const DEFAULT_BUCKET: &str = "default";

/// Names of the four regions a connection works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regions {
    pub entries: String,
    pub mime: String,
    pub tally: String,
    pub buckets: String,
}

impl Regions {
    /// All region names, in a fixed order.
    pub fn all(&self) -> [&str; 4] {
        [&self.entries, &self.mime, &self.tally, &self.buckets]
    }

    /// The regions whose keys are bucket-qualified.
    pub fn bucketed(&self) -> [&str; 3] {
        [&self.entries, &self.mime, &self.tally]
    }
}

/// Byte store slot shared by a configuration and all of its clones.
///
/// Filled by the first `KVConfig::open_store` call and handed out to every
/// later one, so connections built from one configuration see the same data.
#[derive(Clone, Default)]
pub struct SharedStore(Arc<Mutex<Option<Arc<dyn ByteStore>>>>);

impl fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedStore {{ ... }}")
    }
}

/// Open redb stores by absolute path. redb locks its file, so a second
/// `Database::create` on the same path in this process would fail.
fn redb_registry() -> &'static Mutex<HashMap<PathBuf, Weak<RedbStore>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Weak<RedbStore>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Return the live store for `path`, opening it if nobody holds one.
fn shared_redb(path: &Path) -> Result<Arc<RedbStore>, KVError> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut registry = redb_registry()
        .lock()
        .map_err(|e| KVError::Connection(e.to_string()))?;

    if let Some(store) = registry.get(&key).and_then(Weak::upgrade) {
        debug!("KVConfig: reusing redb store {:?}", key);
        return Ok(store);
    }

    let store = Arc::new(RedbStore::open(path)?);
    registry.retain(|_, weak| weak.strong_count() > 0);
    registry.insert(key, Arc::downgrade(&store));
    Ok(store)
}

/// Configuration for a plain key-value connection.
///
/// Table names and the default bucket are fixed at construction time; a
/// connection never reads them from anywhere else.
#[derive(Debug, Clone)]
pub struct KVConfig {
    /// Path to the redb database file. `None` selects the in-memory store.
    pub db_path: Option<PathBuf>,

    pub entry_table: String,
    pub mime_table: String,
    pub tally_table: String,
    pub bucket_table: String,

    /// Bucket selected when a connection is opened.
    pub default_bucket: String,

    /// Store opened for this configuration; shared by its clones.
    pub store: SharedStore,
}

impl Default for KVConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            entry_table: DEFAULT_ENTRY_TABLE.to_string(),
            mime_table: DEFAULT_MIME_TABLE.to_string(),
            tally_table: DEFAULT_TALLY_TABLE.to_string(),
            bucket_table: DEFAULT_BUCKET_TABLE.to_string(),
            default_bucket: DEFAULT_BUCKET.to_string(),
            store: SharedStore::default(),
        }
    }
}

impl KVConfig {
    /// Parse configuration from command-line arguments.
    ///
    /// Supported flags:
    /// - `--db=PATH`
    /// - `--table=NAME`
    /// - `--mime-table=NAME`
    /// - `--tally-table=NAME`
    /// - `--bucket-table=NAME`
    /// - `--bucket=NAME`
    pub fn from_args(args: &[String]) -> Self {
        let mut config = KVConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--db=") {
                config.db_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--table=") {
                config.entry_table = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--mime-table=") {
                config.mime_table = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--tally-table=") {
                config.tally_table = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--bucket-table=") {
                config.bucket_table = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--bucket=") {
                config.default_bucket = val.to_string();
            }
        }

        config
    }

    pub fn regions(&self) -> Regions {
        Regions {
            entries: self.entry_table.clone(),
            mime: self.mime_table.clone(),
            tally: self.tally_table.clone(),
            buckets: self.bucket_table.clone(),
        }
    }

    /// The byte store this configuration points at: redb when `db_path` is
    /// set, the in-memory store otherwise.
    ///
    /// The first call opens the store; later calls on this configuration or
    /// its clones return the same handle. Separate configurations naming the
    /// same redb file also share one store.
    pub fn open_store(&self) -> Result<Arc<dyn ByteStore>, KVError> {
        let mut slot = self
            .store
            .0
            .lock()
            .map_err(|e| KVError::Connection(e.to_string()))?;
        if let Some(store) = slot.as_ref() {
            return Ok(store.clone());
        }

        let store: Arc<dyn ByteStore> = match &self.db_path {
            Some(path) => shared_redb(path)?,
            None => Arc::new(MemoryStore::new()),
        };
        *slot = Some(store.clone());
        Ok(store)
    }
}
