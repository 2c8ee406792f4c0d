use crate::errors::{KeyError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{serde::ts_seconds, DateTime, Utc};
use ed25519_dalek::SigningKey;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Current on-disk key file schema version.
const KEYFILE_VERSION: u8 = 1;
const KDF_LABEL: &str = "argon2id-v1";
const PLAINTEXT_WARNING: &str = "Key file stored without pass-phrase protection";

/// Serialized key file written to disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyFile {
    pub version: u8,
    pub public_key_hex: String,
    #[serde(default)]
    pub metadata: KeyMetadata,
    #[serde(flatten)]
    pub secret: KeySecret,
}

/// Metadata describing when and for which naming authority the key was made.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeyMetadata {
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naming_authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl KeyMetadata {
    pub fn new(naming_authority: Option<String>, warning: Option<String>) -> Self {
        Self {
            created_at: Utc::now(),
            naming_authority,
            notes: None,
            warning,
        }
    }
}

impl Default for KeyMetadata {
    fn default() -> Self {
        KeyMetadata::new(None, None)
    }
}

/// Secret material stored in the key file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "protection", rename_all = "snake_case")]
pub enum KeySecret {
    Plain {
        private_key_hex: String,
    },
    PassPhrase {
        ciphertext: String,
        nonce: String,
        salt: String,
        kdf: String,
    },
}

/// Decrypted Ed25519 key. The seed is wiped when this is dropped.
pub struct PrivateKey {
    signing_key: SigningKey,
}

impl PrivateKey {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn into_signing_key(self) -> SigningKey {
        self.signing_key
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

impl KeyFile {
    /// Create a new key file from freshly generated key material.
    pub fn generate(
        pass_phrase: Option<&str>,
        naming_authority: Option<String>,
        allow_plaintext: bool,
    ) -> Result<(Self, PrivateKey)> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let seed = Zeroizing::new(signing_key.to_bytes());
        let secret = build_secret(&seed, pass_phrase, allow_plaintext)?;
        let metadata = KeyMetadata::new(
            naming_authority,
            if matches!(secret, KeySecret::Plain { .. }) {
                Some(PLAINTEXT_WARNING.to_string())
            } else {
                None
            },
        );

        let keyfile = Self {
            version: KEYFILE_VERSION,
            public_key_hex: hex::encode(signing_key.verifying_key().to_bytes()),
            metadata,
            secret,
        };
        Ok((keyfile, PrivateKey { signing_key }))
    }

    /// Persist the key file to disk atomically.
    pub fn save(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(KeyError::Storage(format!(
                "key file {} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_path(path);
        let data = serde_json::to_vec_pretty(self)?;
        write_private(&tmp_path, &data)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// Load a key file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = Zeroizing::new(fs::read(path)?);
        Self::parse(&data)
    }

    /// Parse key file bytes already in memory.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let keyfile: KeyFile = serde_json::from_slice(bytes)
            .map_err(|err| KeyError::Malformed(err.to_string()))?;
        if keyfile.version != KEYFILE_VERSION {
            return Err(KeyError::Malformed(format!(
                "unsupported key file version {} (expected {})",
                keyfile.version, KEYFILE_VERSION
            )));
        }
        Ok(keyfile)
    }

    pub fn requires_pass_phrase(&self) -> bool {
        matches!(self.secret, KeySecret::PassPhrase { .. })
    }

    /// Unlock the private key using an optional pass-phrase.
    pub fn unlock(&self, pass_phrase: Option<&str>) -> Result<PrivateKey> {
        let seed = match &self.secret {
            KeySecret::Plain { private_key_hex } => {
                let bytes = Zeroizing::new(
                    hex::decode(private_key_hex)
                        .map_err(|err| KeyError::InvalidPrivateKey(err.to_string()))?,
                );
                seed_from_slice(&bytes)?
            }
            KeySecret::PassPhrase {
                ciphertext,
                nonce,
                salt,
                kdf,
            } => {
                if kdf != KDF_LABEL {
                    return Err(KeyError::Malformed(format!("unsupported kdf '{kdf}'")));
                }
                let pwd = pass_phrase.ok_or(KeyError::PassPhraseRequired)?;
                decrypt_private_key(ciphertext, nonce, salt, pwd)?
            }
        };

        let key = PrivateKey::from_seed(&seed);
        if self.public_key_hex != hex::encode(key.public_key()) {
            return Err(KeyError::Decryption(
                "public key in file does not match decrypted private key".into(),
            ));
        }
        Ok(key)
    }
}

/// Write `data` readable by the owner only.
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        // mode() only applies when the file is created.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(data)?;
        file.sync_all()?;
    }

    #[cfg(not(unix))]
    fs::write(path, data)?;

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn seed_from_slice(bytes: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    if bytes.len() != 32 {
        return Err(KeyError::InvalidPrivateKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(bytes);
    Ok(seed)
}

fn build_secret(
    seed: &[u8; 32],
    pass_phrase: Option<&str>,
    allow_plaintext: bool,
) -> Result<KeySecret> {
    if let Some(pwd) = pass_phrase {
        encrypt_private_key(seed, pwd)
    } else if allow_plaintext {
        Ok(KeySecret::Plain {
            private_key_hex: hex::encode(seed),
        })
    } else {
        Err(KeyError::PassPhraseRequired)
    }
}

fn encrypt_private_key(seed: &[u8; 32], pass_phrase: &str) -> Result<KeySecret> {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_encryption_key(pass_phrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|err| KeyError::Encryption(format!("cipher init failed: {err}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, seed.as_slice())
        .map_err(|err| KeyError::Encryption(format!("encryption failed: {err}")))?;

    Ok(KeySecret::PassPhrase {
        ciphertext: BASE64.encode(ciphertext),
        nonce: BASE64.encode(nonce_bytes),
        salt: BASE64.encode(salt),
        kdf: KDF_LABEL.to_string(),
    })
}

fn decrypt_private_key(
    ciphertext: &str,
    nonce: &str,
    salt: &str,
    pass_phrase: &str,
) -> Result<Zeroizing<[u8; 32]>> {
    let ciphertext_bytes = BASE64
        .decode(ciphertext)
        .map_err(|err| KeyError::Decryption(format!("invalid ciphertext: {err}")))?;
    let nonce_bytes = BASE64
        .decode(nonce)
        .map_err(|err| KeyError::Decryption(format!("invalid nonce: {err}")))?;
    let salt_bytes = BASE64
        .decode(salt)
        .map_err(|err| KeyError::Decryption(format!("invalid salt: {err}")))?;

    let key = derive_encryption_key(pass_phrase, &salt_bytes)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|err| KeyError::Decryption(format!("cipher init failed: {err}")))?;
    let nonce_array: [u8; 12] = nonce_bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::Decryption("nonce must be 12 bytes".into()))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce_array), ciphertext_bytes.as_ref())
            .map_err(|_| KeyError::Decryption("wrong pass-phrase or corrupt key data".into()))?,
    );
    seed_from_slice(&plaintext)
}

fn derive_encryption_key(pass_phrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let mut key = Zeroizing::new([0u8; 32]);
    let argon2 = argon2::Argon2::default();
    argon2
        .hash_password_into(pass_phrase.as_bytes(), salt, key.as_mut_slice())
        .map_err(|err| KeyError::Crypto(format!("key derivation failed: {err}")))?;
    Ok(key)
}
