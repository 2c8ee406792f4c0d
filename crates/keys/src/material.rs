//! Loading and unlocking the configured private key.
//!
//! The three steps are kept separate so that a missing pass-phrase can be
//! reported at configuration time without failing it: the key is only
//! rejected once [`decrypt`] actually needs the secret.

use crate::errors::{KeyError, Result};
use crate::keyfile::{KeyFile, PrivateKey};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Key file contents exactly as read from disk.
pub struct RawKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl RawKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn parse(&self) -> Result<KeyFile> {
        KeyFile::parse(&self.bytes)
    }
}

impl std::fmt::Debug for RawKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawKey({} bytes)", self.bytes.len())
    }
}

pub type PassPhrase = Zeroizing<String>;

/// Read the key file at `path`.
pub fn load_private_key(path: Option<&Path>) -> Result<RawKey> {
    let path = path.ok_or(KeyError::PathNotConfigured)?;
    let bytes = fs::read(path).map_err(|source| KeyError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded private key file");
    Ok(RawKey::from_bytes(bytes))
}

/// Whether the key file format demands a pass-phrase.
pub fn requires_pass_phrase(raw: &RawKey) -> Result<bool> {
    Ok(raw.parse()?.requires_pass_phrase())
}

/// Pick the pass-phrase to unlock `raw` with.
///
/// A protected key with no configured pass-phrase is logged and yields
/// `None`; the subsequent [`decrypt`] call then fails.
pub fn derive_pass_phrase(raw: &RawKey, configured: Option<&str>) -> Result<Option<PassPhrase>> {
    if !requires_pass_phrase(raw)? {
        return Ok(None);
    }
    match configured {
        Some(pass_phrase) => Ok(Some(Zeroizing::new(pass_phrase.to_string()))),
        None => {
            warn!("The private key requires a pass phrase and none was provided");
            Ok(None)
        }
    }
}

pub fn decrypt(raw: &RawKey, pass_phrase: Option<&PassPhrase>) -> Result<PrivateKey> {
    let keyfile = raw.parse()?;
    keyfile.unlock(pass_phrase.map(|p| p.as_str()))
}
