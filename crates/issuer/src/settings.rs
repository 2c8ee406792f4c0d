//! Issuer settings.
//!
//! Values come from a config file (or a JSON document handed over by a
//! host) plus `HANDLE_*` environment variables, which fill the top-level
//! fallback keys such as `pass_phrase`. Every setting is
//! looked up under a few alternative paths so that both the native layout
//! (`handle.naming_authority`) and the host layout
//! (`transformerDefaults.handle.namingAuthority`) are accepted.

use crate::errors::{IssuerError, Result};
use config::{Config, Environment, File, FileFormat};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

pub const DEFAULT_SERVER: &str = "127.0.0.1:2641";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

const ENV_PREFIX: &str = "HANDLE";

// config lowercases keys in some sources but not others, so host-style
// paths are listed in both spellings.
const NAMING_AUTHORITY_KEYS: &[&str] = &[
    "handle.naming_authority",
    "transformerDefaults.handle.namingAuthority",
    "transformerdefaults.handle.namingauthority",
    "naming_authority",
];
const PRIVATE_KEY_PATH_KEYS: &[&str] = &[
    "handle.private_key_path",
    "transformerDefaults.handle.privateKeyPath",
    "transformerdefaults.handle.privatekeypath",
    "private_key_path",
];
const PASS_PHRASE_KEYS: &[&str] = &[
    "handle.pass_phrase",
    "transformerDefaults.handle.passPhrase",
    "transformerdefaults.handle.passphrase",
    "pass_phrase",
];
const SERVER_KEYS: &[&str] = &["handle.server", "server"];
const SERVER_MODE_KEYS: &[&str] = &["handle.server_mode", "server_mode"];
const CONNECT_TIMEOUT_KEYS: &[&str] = &["handle.connect_timeout_ms", "connect_timeout_ms"];
const REQUEST_TIMEOUT_KEYS: &[&str] = &["handle.request_timeout_ms", "request_timeout_ms"];
const STORAGE_TYPE_KEYS: &[&str] = &["storage.type", "storage_type"];
const STORAGE_PATH_KEYS: &[&str] = &["storage.path", "storage_path"];
const LOG_LEVEL_KEYS: &[&str] = &["log.level", "log_level"];
const LOG_FORMAT_KEYS: &[&str] = &["log.format", "log_format"];

/// Where create requests are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Framed requests over TCP to `server`.
    #[default]
    Tcp,
    /// In-process simulated server.
    Stub,
}

impl ServerMode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "tcp" => Ok(ServerMode::Tcp),
            "stub" => Ok(ServerMode::Stub),
            other => Err(IssuerError::configuration(format!(
                "unknown server mode '{other}' (expected 'tcp' or 'stub')"
            ))),
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ServerMode::Tcp => "tcp",
            ServerMode::Stub => "stub",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub address: String,
    pub mode: ServerMode,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_SERVER.to_string(),
            mode: ServerMode::Tcp,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

/// Storage collaborator selection. Only the host facade requires it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    pub kind: Option<String>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Clone, Default)]
pub struct IssuerSettings {
    /// Validated when the issuer initializes, not at load time.
    pub naming_authority: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub pass_phrase: Option<Zeroizing<String>>,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

impl IssuerSettings {
    /// Load from a TOML or JSON file plus the environment.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IssuerError::configuration(format!(
                "configuration file {} not found",
                path.display()
            )));
        }
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(&config)
    }

    /// Load from a JSON document plus the environment.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(json, FileFormat::Json))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(&config)
    }

    /// Environment variables only.
    pub fn from_env() -> Result<Self> {
        let config = Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let server_mode = get_string_value(config, SERVER_MODE_KEYS)
            .map(|raw| ServerMode::parse(&raw))
            .transpose()?
            .unwrap_or_default();

        let log_format = match get_string_value(config, LOG_FORMAT_KEYS).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            naming_authority: get_string_value(config, NAMING_AUTHORITY_KEYS),
            private_key_path: get_string_value(config, PRIVATE_KEY_PATH_KEYS).map(PathBuf::from),
            pass_phrase: get_string_value(config, PASS_PHRASE_KEYS).map(Zeroizing::new),
            server: ServerSettings {
                address: get_string_value(config, SERVER_KEYS)
                    .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
                mode: server_mode,
                connect_timeout: Duration::from_millis(get_u64_value(
                    config,
                    CONNECT_TIMEOUT_KEYS,
                    DEFAULT_CONNECT_TIMEOUT_MS,
                )?),
                request_timeout: Duration::from_millis(get_u64_value(
                    config,
                    REQUEST_TIMEOUT_KEYS,
                    DEFAULT_REQUEST_TIMEOUT_MS,
                )?),
            },
            storage: StorageSettings {
                kind: get_string_value(config, STORAGE_TYPE_KEYS).map(|kind| kind.to_lowercase()),
                path: get_string_value(config, STORAGE_PATH_KEYS).map(PathBuf::from),
            },
            log: LogSettings {
                level: get_string_value(config, LOG_LEVEL_KEYS)
                    .unwrap_or_else(|| "info".to_string()),
                format: log_format,
            },
        })
    }

    pub fn pass_phrase(&self) -> Option<&str> {
        self.pass_phrase.as_ref().map(|p| p.as_str())
    }
}

impl fmt::Debug for IssuerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerSettings")
            .field("naming_authority", &self.naming_authority)
            .field("private_key_path", &self.private_key_path)
            .field(
                "pass_phrase",
                &self.pass_phrase.as_ref().map(|_| "<redacted>"),
            )
            .field("server", &self.server)
            .field("storage", &self.storage)
            .field("log", &self.log)
            .finish()
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_u64_value(config: &Config, keys: &[&str], default: u64) -> Result<u64> {
    match get_string_value(config, keys) {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            IssuerError::configuration(format!("expected a number of milliseconds, got '{raw}'"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn native_layout_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[handle]
naming_authority = "20.500.12345"
private_key_path = "/etc/handle/admpriv.json"
pass_phrase = "hunter2"
server = "10.0.0.5:2641"
server_mode = "stub"
request_timeout_ms = 5000

[storage]
type = "sled"
path = "/var/lib/handle"

[log]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let settings = IssuerSettings::load(file.path()).unwrap();
        assert_eq!(settings.naming_authority.as_deref(), Some("20.500.12345"));
        assert_eq!(
            settings.private_key_path,
            Some(PathBuf::from("/etc/handle/admpriv.json"))
        );
        assert_eq!(settings.pass_phrase(), Some("hunter2"));
        assert_eq!(settings.server.address, "10.0.0.5:2641");
        assert_eq!(settings.server.mode, ServerMode::Stub);
        assert_eq!(settings.server.request_timeout, Duration::from_millis(5000));
        assert_eq!(
            settings.server.connect_timeout,
            Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS)
        );
        assert_eq!(settings.storage.kind.as_deref(), Some("sled"));
        assert_eq!(settings.log.format, LogFormat::Json);
    }

    #[test]
    fn host_layout_from_json() {
        let json = r#"{
            "transformerDefaults": {
                "handle": {
                    "namingAuthority": "11234",
                    "privateKeyPath": "admpriv.bin"
                }
            },
            "storage": { "type": "memory" }
        }"#;
        let settings = IssuerSettings::from_json_str(json).unwrap();
        assert_eq!(settings.naming_authority.as_deref(), Some("11234"));
        assert_eq!(settings.private_key_path, Some(PathBuf::from("admpriv.bin")));
        assert!(settings.pass_phrase.is_none());
        assert_eq!(settings.server, ServerSettings::default());
        assert_eq!(settings.storage.kind.as_deref(), Some("memory"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let settings =
            IssuerSettings::from_json_str(r#"{"handle": {"naming_authority": "   "}}"#).unwrap();
        assert!(settings.naming_authority.is_none());
    }

    #[test]
    fn unknown_server_mode_is_rejected() {
        let err = IssuerSettings::from_json_str(r#"{"handle": {"server_mode": "udp"}}"#)
            .unwrap_err();
        assert!(matches!(err, IssuerError::Configuration { .. }));
    }

    #[test]
    fn debug_output_hides_pass_phrase() {
        let settings =
            IssuerSettings::from_json_str(r#"{"handle": {"pass_phrase": "hunter2"}}"#).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = IssuerSettings::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, IssuerError::Configuration { .. }));
    }
}
