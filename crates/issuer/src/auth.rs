//! Signing identity used to authenticate create requests.

use crate::errors::{IssuerError, Result};
use ed25519_dalek::{Signer, SigningKey};
use hdl_keys::PrivateKey;
use hdl_wire::{AdminPermissions, AdminRecord, Credential};
use std::fmt;

/// Index of the authority's public key within its naming-authority handle.
pub const PUBLIC_INDEX: u32 = 300;

/// Prefix under which new handles are created, e.g. `20.500.12345`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamingAuthority(String);

impl NamingAuthority {
    pub fn new(authority: &str) -> Result<Self> {
        let authority = authority.trim();
        if authority.is_empty() {
            return Err(IssuerError::configuration("No naming authority specified!"));
        }
        Ok(Self(authority.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for NamingAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authority, its public-key index, the unlocked key and the admin
/// record granted on every created handle.
///
/// Built once per issuer and immutable afterwards. The signing key is
/// wiped when the context is dropped.
pub struct AuthContext {
    authority: NamingAuthority,
    index: u32,
    signing_key: SigningKey,
    admin_record: AdminRecord,
}

impl AuthContext {
    pub fn build(authority: &str, key: PrivateKey) -> Result<Self> {
        let authority = NamingAuthority::new(authority)?;
        let admin_record = AdminRecord::new(
            authority.as_bytes().to_vec(),
            PUBLIC_INDEX,
            AdminPermissions::full(),
        );
        Ok(Self {
            authority,
            index: PUBLIC_INDEX,
            signing_key: key.into_signing_key(),
            admin_record,
        })
    }

    pub fn authority(&self) -> &NamingAuthority {
        &self.authority
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn admin_record(&self) -> &AdminRecord {
        &self.admin_record
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Credential over a request digest.
    pub fn sign(&self, digest: &[u8; 32]) -> Credential {
        let signature = self.signing_key.sign(digest);
        Credential {
            signer_handle: self.authority.as_bytes().to_vec(),
            signer_index: self.index,
            digest: digest.to_vec(),
            signature: signature.to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("authority", &self.authority)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
