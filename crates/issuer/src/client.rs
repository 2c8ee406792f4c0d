//! Sends signed create requests and classifies the replies.

use crate::auth::AuthContext;
use crate::errors::{IssuerError, ProtocolFailure, Result};
use crate::records::CreateValues;
use crate::transport::HandleTransport;
use chrono::Utc;
use hdl_wire::{
    CreateHandleRequest, Response, ResponseCode, ResponsePayload, UnsignedRequest, MAX_HANDLE_LEN,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long a request stays valid after it is sent.
pub const REQUEST_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);

/// Result of one create attempt that reached a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Created; carries the handle confirmed by the server.
    Success(String),
    /// The suffix is taken. Pick another one.
    AlreadyExists,
    Failure(ProtocolFailure),
}

impl CreateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CreateOutcome::Success(_))
    }

    pub fn handle(&self) -> Option<&str> {
        match self {
            CreateOutcome::Success(handle) => Some(handle),
            _ => None,
        }
    }

    /// `Some(handle)` on success, `None` if the suffix was taken.
    pub fn into_result(self) -> Result<Option<String>> {
        match self {
            CreateOutcome::Success(handle) => Ok(Some(handle)),
            CreateOutcome::AlreadyExists => Ok(None),
            CreateOutcome::Failure(failure) => Err(IssuerError::Protocol(failure)),
        }
    }
}

/// Check a suffix before it goes on the wire.
pub fn validate_suffix(suffix: &str) -> Result<Vec<u8>> {
    let invalid = |reason: &str| IssuerError::InvalidSuffix {
        suffix: suffix.to_string(),
        reason: reason.to_string(),
    };
    if suffix.is_empty() {
        return Err(invalid("suffix is empty"));
    }
    if suffix.len() > MAX_HANDLE_LEN {
        return Err(invalid("suffix is too long"));
    }
    if suffix.chars().any(char::is_control) {
        return Err(invalid("suffix contains control characters"));
    }
    Ok(suffix.as_bytes().to_vec())
}

pub struct HandleClient {
    transport: Arc<dyn HandleTransport>,
    next_request_id: AtomicU32,
}

impl HandleClient {
    pub fn new(transport: Arc<dyn HandleTransport>) -> Self {
        Self {
            transport,
            next_request_id: AtomicU32::new(1),
        }
    }

    fn next_request_id(&self) -> u32 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn expiration() -> u32 {
        let expires = Utc::now().timestamp() + REQUEST_LIFETIME.as_secs() as i64;
        u32::try_from(expires.max(0)).unwrap_or(u32::MAX)
    }

    /// Ask the server to create `suffix` with `values`, signed by `auth`.
    ///
    /// Local problems (bad suffix, unencodable values) are errors; anything
    /// the server or the network says is reported as a [`CreateOutcome`].
    pub async fn submit_create(
        &self,
        suffix: &str,
        values: &CreateValues,
        auth: &AuthContext,
    ) -> Result<CreateOutcome> {
        let handle = validate_suffix(suffix)?;
        let request = CreateHandleRequest::new(handle, values.to_vec())
            .map_err(IssuerError::RecordConstruction)?;
        let unsigned =
            UnsignedRequest::create_handle(self.next_request_id(), Self::expiration(), &request)
                .map_err(IssuerError::RecordConstruction)?;
        let request_id = unsigned.request_id();
        let credential = auth.sign(&unsigned.digest());
        let frame = unsigned
            .into_frame(Some(&credential))
            .map_err(IssuerError::RecordConstruction)?;

        debug!(
            request_id,
            suffix,
            transport = %self.transport.describe(),
            "submitting create-handle request"
        );
        let reply = match self.transport.exchange(frame).await {
            Ok(reply) => reply,
            Err(err) => return Ok(CreateOutcome::Failure(ProtocolFailure::transport(err))),
        };
        let response = match Response::decode(&reply) {
            Ok(response) => response,
            Err(err) => return Ok(CreateOutcome::Failure(ProtocolFailure::malformed(err))),
        };
        if response.request_id != request_id {
            return Ok(CreateOutcome::Failure(ProtocolFailure::malformed(format!(
                "reply to request {} received for request {request_id}",
                response.request_id
            ))));
        }
        Ok(classify(suffix, response))
    }
}

fn classify(suffix: &str, response: Response) -> CreateOutcome {
    match (response.code, response.payload) {
        (ResponseCode::Success, ResponsePayload::Handle(handle)) => CreateOutcome::Success(handle),
        (ResponseCode::Success, _) => CreateOutcome::Failure(ProtocolFailure::malformed(
            "success response did not carry the created handle",
        )),
        (ResponseCode::HandleAlreadyExists, _) => {
            warn!("Handle '{}' already in use", suffix);
            CreateOutcome::AlreadyExists
        }
        (code, ResponsePayload::Error(message)) => {
            CreateOutcome::Failure(ProtocolFailure::error_response(code, &message))
        }
        (code, ResponsePayload::Empty | ResponsePayload::Handle(_)) => {
            CreateOutcome::Failure(ProtocolFailure::no_error_payload(code))
        }
    }
}
