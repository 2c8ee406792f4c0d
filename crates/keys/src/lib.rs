//! Handle Issuer Key Material
//!
//! Private key files used to sign handle-creation requests. Keys are
//! Ed25519 seeds stored either in plain hex or encrypted with AES-256-GCM
//! under an Argon2id-derived key.

pub mod errors;
pub mod keyfile;
pub mod material;

pub use errors::*;
pub use keyfile::{KeyFile, KeyMetadata, KeySecret, PrivateKey};
pub use material::{
    decrypt, derive_pass_phrase, load_private_key, requires_pass_phrase, PassPhrase, RawKey,
};
