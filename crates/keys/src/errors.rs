use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("no private key path configured")]
    PathNotConfigured,

    #[error("private key file {path} does not exist or cannot be read")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed key file: {0}")]
    Malformed(String),

    #[error("key file is pass-phrase protected and no pass-phrase was supplied")]
    PassPhraseRequired,

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl KeyError {
    /// The key could not be located at all, as opposed to being unusable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KeyError::PathNotConfigured | KeyError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, KeyError>;
