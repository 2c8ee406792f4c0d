//! Object storage collaborator used by the transformer host.
//!
//! The issuer itself never touches storage. The host opens it on init,
//! records every handle it minted, and shuts it down when it is done.

use crate::errors::{IssuerError, Result};
use crate::settings::StorageSettings;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

const ISSUED_TREE: &str = "issued_handles";

/// A handle created through the transformer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedHandle {
    pub handle: String,
    pub suffix: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

pub trait ObjectStorage: Send + Sync {
    fn kind(&self) -> &'static str;

    fn init(&mut self) -> Result<()>;

    fn shutdown(&mut self) -> Result<()>;

    fn record_issued(&self, issued: &IssuedHandle) -> Result<()>;

    fn get_issued(&self, handle: &str) -> Result<Option<IssuedHandle>>;
}

/// Storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    issued: RwLock<HashMap<String, IssuedHandle>>,
    open: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(IssuerError::storage("memory storage is not initialized"))
        }
    }
}

impl ObjectStorage for MemoryStorage {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn init(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn record_issued(&self, issued: &IssuedHandle) -> Result<()> {
        self.ensure_open()?;
        self.issued
            .write()
            .insert(issued.handle.clone(), issued.clone());
        Ok(())
    }

    fn get_issued(&self, handle: &str) -> Result<Option<IssuedHandle>> {
        self.ensure_open()?;
        Ok(self.issued.read().get(handle).cloned())
    }
}

/// Sled-backed storage, opened on `init`.
pub struct SledStorage {
    path: PathBuf,
    db: Option<sled::Db>,
}

impl SledStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            db: None,
        }
    }

    fn tree(&self) -> Result<sled::Tree> {
        let db = self
            .db
            .as_ref()
            .ok_or_else(|| IssuerError::storage("sled storage is not initialized"))?;
        db.open_tree(ISSUED_TREE).map_err(sled_error)
    }
}

impl ObjectStorage for SledStorage {
    fn kind(&self) -> &'static str {
        "sled"
    }

    fn init(&mut self) -> Result<()> {
        if self.db.is_none() {
            let db = sled::open(&self.path).map_err(sled_error)?;
            info!(path = %self.path.display(), "storage initialized");
            self.db = Some(db);
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(db) = self.db.take() {
            db.flush().map_err(sled_error)?;
            debug!(path = %self.path.display(), "storage flushed and closed");
        }
        Ok(())
    }

    fn record_issued(&self, issued: &IssuedHandle) -> Result<()> {
        let value = serde_json::to_vec(issued)
            .map_err(|err| IssuerError::storage_caused_by("serialization error", err))?;
        self.tree()?
            .insert(issued.handle.as_bytes(), value)
            .map_err(sled_error)?;
        Ok(())
    }

    fn get_issued(&self, handle: &str) -> Result<Option<IssuedHandle>> {
        match self.tree()?.get(handle.as_bytes()).map_err(sled_error)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| IssuerError::storage_caused_by("corrupt record", err)),
            None => Ok(None),
        }
    }
}

fn sled_error(err: sled::Error) -> IssuerError {
    IssuerError::storage_caused_by("sled error", err)
}

/// Storage named by `storage.type`.
pub fn open_storage(settings: &StorageSettings) -> Result<Box<dyn ObjectStorage>> {
    match settings.kind.as_deref() {
        Some("memory") => Ok(Box::new(MemoryStorage::new())),
        Some("sled") => {
            let path = settings.path.clone().ok_or_else(|| {
                IssuerError::configuration("storage.path is required for sled storage")
            })?;
            Ok(Box::new(SledStorage::new(path)))
        }
        Some(other) => Err(IssuerError::configuration(format!(
            "unknown storage type '{other}'"
        ))),
        None => Err(IssuerError::configuration("No storage type specified!")),
    }
}
