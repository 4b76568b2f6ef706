use tracing::debug;

use crate::error::KVError;
use crate::store::{ByteRead, ByteTxn};

/// Byte placed between the bucket name and the key in a physical key.
pub const SEP: u8 = 0x00;

/// BucketRouter maps (bucket, key) pairs to physical keys.
///
/// Physical key layout: `{bucket}\0{key}`. Bucket names may not contain the
/// separator, so the prefix `{bucket}\0` selects exactly one bucket.
#[derive(Debug, Clone)]
pub struct BucketRouter {
    current: String,
}

impl BucketRouter {
    /// Create a router with `bucket` selected. The name is validated.
    pub fn new(bucket: &str) -> Result<Self, KVError> {
        validate_bucket(bucket)?;
        Ok(Self {
            current: bucket.to_string(),
        })
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Switch the active bucket.
    pub fn select(&mut self, bucket: &str) -> Result<(), KVError> {
        validate_bucket(bucket)?;
        if self.current != bucket {
            debug!("BucketRouter: switching bucket {:?} -> {:?}", self.current, bucket);
            self.current = bucket.to_string();
        }
        Ok(())
    }

    /// Physical key for `key` in the active bucket.
    pub fn compose(&self, key: &str) -> Vec<u8> {
        compose(&self.current, key)
    }

    /// Scan prefix covering every key of the active bucket that starts with
    /// `head`.
    pub fn prefix(&self, head: &str) -> Vec<u8> {
        compose(&self.current, head)
    }

    /// Recover the un-qualified key from a physical key of the active bucket.
    /// Returns None for keys that belong to another bucket.
    pub fn strip(&self, physical: &[u8]) -> Option<String> {
        let rest = physical.strip_prefix(self.current.as_bytes())?;
        let (&sep, key) = rest.split_first()?;
        if sep != SEP {
            return None;
        }
        String::from_utf8(key.to_vec()).ok()
    }
}

/// Reject empty bucket names and names containing the separator.
pub fn validate_bucket(bucket: &str) -> Result<(), KVError> {
    if bucket.is_empty() {
        return Err(KVError::Validation("bucket name is empty".to_string()));
    }
    if bucket.as_bytes().contains(&SEP) {
        return Err(KVError::Validation(format!(
            "bucket name {:?} contains the key separator",
            bucket
        )));
    }
    Ok(())
}

/// Physical key for `key` inside `bucket`.
pub fn compose(bucket: &str, key: &str) -> Vec<u8> {
    let mut physical = Vec::with_capacity(bucket.len() + 1 + key.len());
    physical.extend_from_slice(bucket.as_bytes());
    physical.push(SEP);
    physical.extend_from_slice(key.as_bytes());
    physical
}

/// Note `bucket` in the bucket index region. Idempotent.
pub fn record(txn: &mut dyn ByteTxn, region: &str, bucket: &str) -> Result<(), KVError> {
    if txn.get(region, bucket.as_bytes())?.is_none() {
        txn.put(region, bucket.as_bytes(), &[])?;
    }
    Ok(())
}

/// Every bucket noted in the index, sorted by name.
pub fn recorded(view: &dyn ByteRead, region: &str) -> Result<Vec<String>, KVError> {
    view.scan(region, &[])?
        .into_iter()
        .map(|(name, _)| {
            String::from_utf8(name).map_err(|e| KVError::Storage(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_strip() {
        let router = BucketRouter::new("b1").unwrap();
        let physical = router.compose("x");
        assert_eq!(physical, b"b1\0x".to_vec());
        assert_eq!(router.strip(&physical), Some("x".to_string()));
    }

    #[test]
    fn test_strip_rejects_other_buckets() {
        let router = BucketRouter::new("b").unwrap();
        assert_eq!(router.strip(&compose("b1", "x")), None);
        assert_eq!(router.strip(&compose("a", "x")), None);
        assert_eq!(router.strip(&compose("b", "")), Some(String::new()));
    }

    #[test]
    fn test_prefixes_do_not_overlap() {
        // "a" must not see keys of "ab".
        let physical = compose("ab", "x");
        let prefix = BucketRouter::new("a").unwrap().prefix("");
        assert!(!physical.starts_with(&prefix));
    }

    #[test]
    fn test_select_validates() {
        let mut router = BucketRouter::new("default").unwrap();
        assert!(matches!(router.select(""), Err(KVError::Validation(_))));
        assert!(matches!(
            router.select("bad\0name"),
            Err(KVError::Validation(_))
        ));
        assert_eq!(router.current(), "default");

        router.select("b2").unwrap();
        assert_eq!(router.current(), "b2");
    }

    #[test]
    fn test_index_records_once() {
        use crate::config::KVConfig;
        use crate::memory::MemoryStore;
        use crate::store::ByteStore;

        let store = MemoryStore::new();
        store.prepare(&KVConfig::default().regions()).unwrap();

        let mut txn = store.begin_write().unwrap();
        record(txn.as_mut(), "KeyValueBucketTbl", "zeta").unwrap();
        record(txn.as_mut(), "KeyValueBucketTbl", "alpha").unwrap();
        record(txn.as_mut(), "KeyValueBucketTbl", "zeta").unwrap();
        txn.commit().unwrap();

        let view = store.begin_read().unwrap();
        assert_eq!(
            recorded(view.as_ref(), "KeyValueBucketTbl").unwrap(),
            vec!["alpha".to_string(), "zeta".to_string()]
        );
    }
}
