use super::{HandleTransport, TransportError};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use hdl_wire::{decode_create_request, DecodedRequest, HandleValue, Response, ResponseCode};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-memory handle server.
///
/// Requests are decoded with the same codec a real server would use.
/// Suffixes without a `/` are stored under the signer's authority.
/// Credentials must carry the digest of the request; if a public key is
/// registered for the signer its signature is checked as well.
#[derive(Clone, Default)]
pub struct StubHandleService {
    handles: Arc<RwLock<HashMap<String, Vec<HandleValue>>>>,
    trusted_keys: Arc<RwLock<HashMap<(Vec<u8>, u32), VerifyingKey>>>,
    requests: Arc<RwLock<Vec<DecodedRequest>>>,
}

impl StubHandleService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require signatures from `signer` at `index` to verify with `public_key`.
    pub fn trust_key(&self, signer: &str, index: u32, public_key: &[u8; 32]) -> bool {
        match VerifyingKey::from_bytes(public_key) {
            Ok(key) => {
                self.trusted_keys
                    .write()
                    .insert((signer.as_bytes().to_vec(), index), key);
                true
            }
            Err(_) => false,
        }
    }

    /// Mark `handle` (fully qualified) as taken without a request.
    pub fn reserve(&self, handle: &str) {
        self.handles.write().insert(handle.to_string(), Vec::new());
    }

    pub fn get(&self, handle: &str) -> Option<Vec<HandleValue>> {
        self.handles.read().get(handle).cloned()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.handles.read().contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<DecodedRequest> {
        self.requests.read().clone()
    }

    fn handle_request(&self, request: DecodedRequest) -> Response {
        let request_id = request.envelope.request_id;
        let verdict = self.authenticate(&request);
        self.requests.write().push(request.clone());
        let signer = match verdict {
            Ok(signer) => signer,
            Err(response) => return response,
        };

        let handle = qualify(&signer, &String::from_utf8_lossy(&request.request.handle));
        let mut handles = self.handles.write();
        if handles.contains_key(&handle) {
            return Response::error(
                request_id,
                ResponseCode::HandleAlreadyExists,
                format!("handle {handle} already exists"),
            );
        }
        handles.insert(handle.clone(), request.request.values);
        debug!(%handle, "stub created handle");
        Response::success(request_id, handle)
    }

    /// Signer authority of a request whose credential checks out.
    fn authenticate(&self, request: &DecodedRequest) -> Result<String, Response> {
        let request_id = request.envelope.request_id;
        let Some(credential) = &request.credential else {
            return Err(Response::bare(request_id, ResponseCode::AuthenticationNeeded));
        };
        if credential.digest != request.digest {
            return Err(Response::error(
                request_id,
                ResponseCode::InvalidCredential,
                "credential digest does not match request",
            ));
        }

        let key = self
            .trusted_keys
            .read()
            .get(&(credential.signer_handle.clone(), credential.signer_index))
            .cloned();
        if let Some(key) = key {
            let verified = Signature::from_slice(&credential.signature)
                .map(|signature| key.verify(&request.digest, &signature).is_ok())
                .unwrap_or(false);
            if !verified {
                return Err(Response::error(
                    request_id,
                    ResponseCode::AuthenticationFailed,
                    "signature verification failed",
                ));
            }
        }
        Ok(String::from_utf8_lossy(&credential.signer_handle).into_owned())
    }
}

/// Bare suffixes are created under the signer's authority.
fn qualify(authority: &str, handle: &str) -> String {
    if handle.contains('/') {
        handle.to_string()
    } else {
        format!("{authority}/{handle}")
    }
}

#[async_trait]
impl HandleTransport for StubHandleService {
    async fn exchange(&self, frame: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let response = match decode_create_request(&frame) {
            Ok(request) => self.handle_request(request),
            Err(err) => Response::error(0, ResponseCode::ProtocolError, err.to_string()),
        };
        Ok(response.encode(0)?)
    }

    fn describe(&self) -> String {
        "stub".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdl_wire::{CreateHandleRequest, ResponsePayload, UnsignedRequest};

    #[test]
    fn bare_suffix_is_qualified() {
        assert_eq!(qualify("11234", "abc"), "11234/abc");
        assert_eq!(qualify("11234", "99/abc"), "99/abc");
    }

    #[tokio::test]
    async fn unsigned_request_needs_authentication() {
        let stub = StubHandleService::new();
        let request = CreateHandleRequest::new(b"abc".to_vec(), Vec::new()).unwrap();
        let frame = UnsignedRequest::create_handle(7, 0, &request)
            .unwrap()
            .into_frame(None)
            .unwrap();

        let reply = Response::decode(&stub.exchange(frame).await.unwrap()).unwrap();
        assert_eq!(reply.request_id, 7);
        assert_eq!(reply.code, ResponseCode::AuthenticationNeeded);
        assert_eq!(reply.payload, ResponsePayload::Empty);
        assert!(stub.is_empty());
        assert_eq!(stub.requests().len(), 1);
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        let stub = StubHandleService::new();
        let reply = tokio_test::block_on(stub.exchange(vec![1, 2, 3])).unwrap();
        let reply = Response::decode(&reply).unwrap();
        assert_eq!(reply.code, ResponseCode::ProtocolError);
        assert!(matches!(reply.payload, ResponsePayload::Error(_)));
    }
}
