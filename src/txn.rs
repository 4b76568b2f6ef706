use tracing::{debug, warn};

use crate::error::KVError;
use crate::store::{ByteRead, ByteStore, ByteTxn};

/// TxnCoordinator owns the begin/commit/rollback lifecycle of a connection.
///
/// While Active, every region is read and written through the one live
/// write transaction, so entries, MIME records, tallies and the bucket index
/// commit or roll back together. While Idle, each mutation runs as its own
/// autocommit unit and each read gets a fresh read view.
#[derive(Default)]
pub struct TxnCoordinator {
    active: Option<Box<dyn ByteTxn>>,
}

impl TxnCoordinator {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn begin(&mut self, store: &dyn ByteStore) -> Result<(), KVError> {
        if self.active.is_some() {
            return Err(KVError::State("transaction already active".to_string()));
        }
        self.active = Some(store.begin_write()?);
        debug!("TxnCoordinator: begin");
        Ok(())
    }

    /// Commit the active transaction. The coordinator is Idle afterwards
    /// even if the engine rejects the commit.
    pub fn commit(&mut self) -> Result<(), KVError> {
        let txn = self
            .active
            .take()
            .ok_or_else(|| KVError::State("no active transaction".to_string()))?;
        txn.commit()?;
        debug!("TxnCoordinator: commit");
        Ok(())
    }

    /// Discard the active transaction. The coordinator is Idle afterwards.
    pub fn rollback(&mut self) -> Result<(), KVError> {
        let txn = self
            .active
            .take()
            .ok_or_else(|| KVError::State("no active transaction".to_string()))?;
        txn.rollback()?;
        debug!("TxnCoordinator: rollback");
        Ok(())
    }

    /// Run `f` against the active transaction, or against a fresh read view
    /// of committed data when Idle.
    pub fn read<R, F>(&self, store: &dyn ByteStore, f: F) -> Result<R, KVError>
    where
        F: FnOnce(&dyn ByteRead) -> Result<R, KVError>,
    {
        match &self.active {
            Some(txn) => f(txn.as_read()),
            None => {
                let view = store.begin_read()?;
                f(view.as_ref())
            }
        }
    }

    /// Run `f` inside the active transaction, or as one autocommit unit when
    /// Idle: committed if `f` succeeds, rolled back if it fails.
    pub fn write<R, F>(&mut self, store: &dyn ByteStore, f: F) -> Result<R, KVError>
    where
        F: FnOnce(&mut dyn ByteTxn) -> Result<R, KVError>,
    {
        if let Some(txn) = self.active.as_mut() {
            return f(txn.as_mut());
        }

        let mut txn = store.begin_write()?;
        match f(txn.as_mut()) {
            Ok(result) => {
                txn.commit()?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback() {
                    warn!("TxnCoordinator: autocommit rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}
