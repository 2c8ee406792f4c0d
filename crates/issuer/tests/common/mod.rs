#![allow(dead_code)]

use async_trait::async_trait;
use hdl_issuer::{
    HandleTransport, IssuerSettings, ServerMode, ServerSettings, StorageSettings, TransportError,
};
use hdl_keys::{KeyFile, PrivateKey};
use hdl_wire::{decode_create_request, Response};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use zeroize::Zeroizing;

pub const AUTHORITY: &str = "100.1234";

/// Write a fresh key file into `dir`.
pub fn write_key(dir: &Path, pass_phrase: Option<&str>) -> (PathBuf, PrivateKey) {
    let path = dir.join("admpriv.json");
    let (keyfile, key) =
        KeyFile::generate(pass_phrase, Some(AUTHORITY.to_string()), pass_phrase.is_none())
            .unwrap();
    keyfile.save(&path, true).unwrap();
    (path, key)
}

pub fn settings(key_path: &Path, pass_phrase: Option<&str>) -> IssuerSettings {
    IssuerSettings {
        naming_authority: Some(AUTHORITY.to_string()),
        private_key_path: Some(key_path.to_path_buf()),
        pass_phrase: pass_phrase.map(|p| Zeroizing::new(p.to_string())),
        server: ServerSettings {
            mode: ServerMode::Stub,
            ..Default::default()
        },
        storage: StorageSettings {
            kind: Some("memory".into()),
            path: None,
        },
        ..Default::default()
    }
}

/// Temporary directory holding an unprotected key, plus settings using it.
pub fn plain_setup() -> (TempDir, IssuerSettings, PrivateKey) {
    let dir = tempfile::tempdir().unwrap();
    let (path, key) = write_key(dir.path(), None);
    let settings = settings(&path, None);
    (dir, settings, key)
}

/// Answers every request with a canned reply built from the request id.
pub struct ScriptedTransport {
    reply: Box<dyn Fn(u32) -> Result<Vec<u8>, TransportError> + Send + Sync>,
    calls: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn responding(response: impl Fn(u32) -> Response + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(move |id| Ok(response(id).encode(0).unwrap())),
            calls: Mutex::new(0),
        })
    }

    pub fn raw(
        reply: impl Fn(u32) -> Result<Vec<u8>, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl HandleTransport for ScriptedTransport {
    async fn exchange(&self, frame: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        *self.calls.lock() += 1;
        let request = decode_create_request(&frame).unwrap();
        (self.reply)(request.envelope.request_id)
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
