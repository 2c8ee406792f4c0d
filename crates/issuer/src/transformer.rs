//! Host-facing facade: configure once, then mint one handle per item.

use crate::client::CreateOutcome;
use crate::errors::Result;
use crate::service::HandleCreationService;
use crate::settings::IssuerSettings;
use crate::storage::{open_storage, IssuedHandle, ObjectStorage};
use crate::transport::HandleTransport;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const TRANSFORMER_ID: &str = "handle";
pub const TRANSFORMER_NAME: &str = "Handle Transformer";

/// One item to mint a handle for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleItem {
    pub suffix: String,
    #[serde(default)]
    pub description: String,
}

impl HandleItem {
    pub fn new(suffix: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            description: description.into(),
        }
    }
}

pub struct HandleTransformer {
    service: HandleCreationService,
    storage: Box<dyn ObjectStorage>,
}

impl HandleTransformer {
    pub async fn init_from_file(path: &Path) -> Result<Self> {
        Self::from_settings(IssuerSettings::load(path)?).await
    }

    pub async fn init_from_str(json: &str) -> Result<Self> {
        Self::from_settings(IssuerSettings::from_json_str(json)?).await
    }

    pub async fn from_settings(settings: IssuerSettings) -> Result<Self> {
        let service = HandleCreationService::new(settings);
        Self::start(service).await
    }

    /// Like [`from_settings`](Self::from_settings) with an explicit transport.
    pub async fn with_transport(
        settings: IssuerSettings,
        transport: Arc<dyn HandleTransport>,
    ) -> Result<Self> {
        Self::start(HandleCreationService::with_transport(settings, transport)).await
    }

    async fn start(service: HandleCreationService) -> Result<Self> {
        let mut storage = open_storage(&service.settings().storage)?;
        storage.init()?;
        if let Err(err) = service.initialize().await {
            if let Err(shutdown_err) = storage.shutdown() {
                warn!(error = %shutdown_err, "failed to shut down storage after init error");
            }
            return Err(err);
        }
        info!(storage = storage.kind(), "{} ready", TRANSFORMER_NAME);
        Ok(Self { service, storage })
    }

    pub fn id(&self) -> &'static str {
        TRANSFORMER_ID
    }

    pub fn name(&self) -> &'static str {
        TRANSFORMER_NAME
    }

    pub fn service(&self) -> &HandleCreationService {
        &self.service
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    /// Issue exactly one create request for `item`.
    ///
    /// A handle the server confirmed is returned even if recording it in
    /// storage fails; that failure is only logged.
    pub async fn transform(&self, item: &HandleItem) -> Result<CreateOutcome> {
        let outcome = self
            .service
            .create_handle(&item.suffix, &item.description)
            .await?;
        if let CreateOutcome::Success(handle) = &outcome {
            let issued = IssuedHandle {
                handle: handle.clone(),
                suffix: item.suffix.clone(),
                description: item.description.clone(),
                created_at: Utc::now(),
            };
            if let Err(err) = self.storage.record_issued(&issued) {
                error!(%handle, error = %err, "created handle could not be recorded in storage");
            }
        }
        Ok(outcome)
    }

    /// Drop the signing identity and build it again from the same settings.
    pub async fn reset(&mut self) -> Result<()> {
        self.service.reset();
        self.service.initialize().await?;
        Ok(())
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.storage.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ServerMode, ServerSettings, StorageSettings};
    use crate::storage::MemoryStorage;
    use crate::transport::StubHandleService;
    use hdl_keys::KeyFile;

    #[tokio::test]
    async fn storage_failure_keeps_the_created_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admpriv.json");
        let (keyfile, _key) = KeyFile::generate(None, None, true).unwrap();
        keyfile.save(&path, false).unwrap();
        let settings = IssuerSettings {
            naming_authority: Some("11234".into()),
            private_key_path: Some(path),
            server: ServerSettings {
                mode: ServerMode::Stub,
                ..Default::default()
            },
            storage: StorageSettings {
                kind: Some("memory".into()),
                path: None,
            },
            ..Default::default()
        };

        let stub = Arc::new(StubHandleService::new());
        // Never initialized, so every write fails.
        let transformer = HandleTransformer {
            service: HandleCreationService::with_transport(settings, stub.clone()),
            storage: Box::new(MemoryStorage::new()),
        };

        let outcome = transformer
            .transform(&HandleItem::new("x", "lost write"))
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Success("11234/x".into()));
        assert!(stub.contains("11234/x"));
    }
}
