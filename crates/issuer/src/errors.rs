//! Error types for handle issuance

use crate::transport::TransportError;
use hdl_keys::KeyError;
use hdl_wire::{ResponseCode, WireError};
use std::sync::Arc;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum IssuerError {
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    #[error("private key not found: {0}")]
    KeyNotFound(#[source] KeyError),

    #[error("private key could not be decrypted: {0}")]
    KeyDecryption(#[source] KeyError),

    #[error("invalid suffix '{suffix}': {reason}")]
    InvalidSuffix { suffix: String, reason: String },

    #[error("error creating handle values: {0}")]
    RecordConstruction(#[source] WireError),

    #[error(transparent)]
    Protocol(#[from] ProtocolFailure),

    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl IssuerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        IssuerError::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        IssuerError::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Storage failure caused by `source`.
    pub fn storage_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        IssuerError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<KeyError> for IssuerError {
    fn from(err: KeyError) -> Self {
        if err.is_not_found() {
            IssuerError::KeyNotFound(err)
        } else {
            IssuerError::KeyDecryption(err)
        }
    }
}

impl From<config::ConfigError> for IssuerError {
    fn from(err: config::ConfigError) -> Self {
        IssuerError::Configuration {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Why a create request did not produce a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server answered with an error payload.
    ErrorResponse(ResponseCode),
    /// The server answered with a failure code and nothing else.
    NoErrorPayload(ResponseCode),
    /// Sending or receiving failed, timeouts included.
    Transport,
    /// The reply could not be decoded or did not match the request.
    MalformedResponse,
}

/// Terminal failure of one create attempt.
///
/// Equality compares `kind` and `reason` only.
#[derive(Error, Debug, Clone)]
#[error("{reason}")]
pub struct ProtocolFailure {
    pub kind: FailureKind,
    pub reason: String,
    #[source]
    pub cause: Option<Arc<TransportError>>,
}

impl PartialEq for ProtocolFailure {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.reason == other.reason
    }
}

impl Eq for ProtocolFailure {}

impl ProtocolFailure {
    pub fn error_response(code: ResponseCode, message: &str) -> Self {
        Self {
            kind: FailureKind::ErrorResponse(code),
            reason: format!("Error creating handle ({code}): {message}"),
            cause: None,
        }
    }

    pub fn no_error_payload(code: ResponseCode) -> Self {
        Self {
            kind: FailureKind::NoErrorPayload(code),
            reason: format!(
                "Unexpected: the create call failed without an error payload. Message: '{}' (code {})",
                code.message(),
                code.as_u32()
            ),
            cause: None,
        }
    }

    pub fn transport(err: TransportError) -> Self {
        Self {
            kind: FailureKind::Transport,
            reason: format!("Error attempting to create handle: {err}"),
            cause: Some(Arc::new(err)),
        }
    }

    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self {
            kind: FailureKind::MalformedResponse,
            reason: format!("Malformed response to create request: {detail}"),
            cause: None,
        }
    }

    /// Response code reported by the server, if one was received.
    pub fn response_code(&self) -> Option<ResponseCode> {
        match self.kind {
            FailureKind::ErrorResponse(code) | FailureKind::NoErrorPayload(code) => Some(code),
            FailureKind::Transport | FailureKind::MalformedResponse => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IssuerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn key_errors_split_by_cause() {
        let missing = KeyError::NotFound {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(matches!(IssuerError::from(missing), IssuerError::KeyNotFound(_)));
        assert!(matches!(
            IssuerError::from(KeyError::PassPhraseRequired),
            IssuerError::KeyDecryption(_)
        ));
    }

    #[test]
    fn missing_payload_reason_uses_code_table() {
        let failure = ProtocolFailure::no_error_payload(ResponseCode::ServerTooBusy);
        assert!(failure.reason.contains("server too busy"));
        assert!(failure.reason.contains("without an error payload"));
        assert_eq!(failure.response_code(), Some(ResponseCode::ServerTooBusy));
    }

    #[test]
    fn transport_cause_is_kept_in_the_chain() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        let failure = ProtocolFailure::transport(TransportError::Connect {
            address: "127.0.0.1:1".into(),
            source: io,
        });
        assert_eq!(failure.kind, FailureKind::Transport);

        let transport = failure.source().expect("transport cause");
        assert!(transport.to_string().contains("127.0.0.1:1"));
        let io = transport.source().expect("io cause");
        assert!(io.downcast_ref::<std::io::Error>().is_some());

        let err = IssuerError::from(failure);
        assert!(err.source().and_then(|e| e.source()).is_some());
    }

    #[test]
    fn failures_compare_by_kind_and_reason() {
        let timeout = || {
            ProtocolFailure::transport(TransportError::Timeout {
                stage: "request",
                after: Duration::from_secs(1),
            })
        };
        assert_eq!(timeout(), timeout());
        assert_ne!(timeout(), ProtocolFailure::malformed("x"));
    }

    #[test]
    fn storage_errors_keep_their_cause() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = IssuerError::storage_caused_by("corrupt record", parse);
        assert!(err.to_string().contains("corrupt record"));
        let cause = err.source().expect("storage cause");
        assert!(cause.downcast_ref::<serde_json::Error>().is_some());

        assert!(IssuerError::storage("not initialized").source().is_none());
    }
}
