//! Message framing: envelope, header, body and credential section.
//!
//! A frame is a 20-byte [`Envelope`] followed by the message proper:
//! a 24-byte [`Header`], the body, and a credential section. The
//! credential signs `SHA-256(header || body)`, so the digest is computed
//! from the exact bytes that travel on the wire.

use crate::codec::{Reader, Writer};
use crate::errors::{Result, WireError};
use crate::response_code::ResponseCode;
use crate::value::{HandleValue, MAX_HANDLE_LEN};
use sha2::{Digest, Sha256};

pub const MAJOR_VERSION: u8 = 2;
pub const MINOR_VERSION: u8 = 1;

pub const ENVELOPE_LEN: usize = 20;
pub const HEADER_LEN: usize = 24;

/// Largest message (header + body + credential) accepted when decoding.
pub const MAX_MESSAGE_LEN: usize = 16 << 20;

pub const OC_CREATE_HANDLE: u32 = 101;

/// Credential type for public-key signatures.
pub const CREDENTIAL_TYPE_SIGNED: &[u8] = b"HS_SIGNED";
pub const DIGEST_ALG_SHA256: u8 = 3;
pub const SIGNATURE_ALG_ED25519: &[u8] = b"Ed25519";

const MAX_VALUES: u32 = 4096;
const MAX_CREDENTIAL_FIELD: usize = 4096;
const MAX_ERROR_MESSAGE: usize = 64 * 1024;

/// Fixed-size prefix carried by every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub major_version: u8,
    pub minor_version: u8,
    pub flags: u16,
    pub session_id: u32,
    pub request_id: u32,
    pub sequence_number: u32,
    /// Length of everything after the envelope.
    pub message_length: u32,
}

impl Envelope {
    pub fn new(request_id: u32, message_length: u32) -> Self {
        Self {
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            flags: 0,
            session_id: 0,
            request_id,
            sequence_number: 0,
            message_length,
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        w.put_u8(self.major_version);
        w.put_u8(self.minor_version);
        w.put_u16(self.flags);
        w.put_u32(self.session_id);
        w.put_u32(self.request_id);
        w.put_u32(self.sequence_number);
        w.put_u32(self.message_length);
    }

    /// Parse and validate the envelope at the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let envelope = Self {
            major_version: r.get_u8()?,
            minor_version: r.get_u8()?,
            flags: r.get_u16()?,
            session_id: r.get_u32()?,
            request_id: r.get_u32()?,
            sequence_number: r.get_u32()?,
            message_length: r.get_u32()?,
        };
        if envelope.major_version != MAJOR_VERSION {
            return Err(WireError::UnsupportedVersion {
                major: envelope.major_version,
                minor: envelope.minor_version,
            });
        }
        if envelope.message_length as usize > MAX_MESSAGE_LEN {
            return Err(WireError::TooLarge {
                field: "message",
                len: envelope.message_length as usize,
                limit: MAX_MESSAGE_LEN,
            });
        }
        Ok(envelope)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub op_code: u32,
    pub response_code: ResponseCode,
    pub op_flags: u32,
    pub site_info_serial: u16,
    pub recursion_count: u8,
    /// Unix seconds after which the server may drop the message.
    pub expiration: u32,
    pub body_length: u32,
}

impl Header {
    pub fn encode(&self, w: &mut Writer) {
        w.put_u32(self.op_code);
        w.put_u32(self.response_code.as_u32());
        w.put_u32(self.op_flags);
        w.put_u16(self.site_info_serial);
        w.put_u8(self.recursion_count);
        w.put_u8(0);
        w.put_u32(self.expiration);
        w.put_u32(self.body_length);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let op_code = r.get_u32()?;
        let response_code = ResponseCode::from_u32(r.get_u32()?);
        let op_flags = r.get_u32()?;
        let site_info_serial = r.get_u16()?;
        let recursion_count = r.get_u8()?;
        let _reserved = r.get_u8()?;
        let expiration = r.get_u32()?;
        let body_length = r.get_u32()?;
        Ok(Self {
            op_code,
            response_code,
            op_flags,
            site_info_serial,
            recursion_count,
            expiration,
            body_length,
        })
    }
}

/// Public-key credential attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub signer_handle: Vec<u8>,
    pub signer_index: u32,
    pub digest: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Credential {
    fn encode_section(&self, w: &mut Writer) -> Result<()> {
        let mut inner = Writer::new();
        inner.put_u8(1); // credential version
        inner.put_u8(0);
        inner.put_u16(0); // options
        inner.put_bytes("signer handle", &self.signer_handle)?;
        inner.put_u32(self.signer_index);
        inner.put_bytes("credential type", CREDENTIAL_TYPE_SIGNED)?;

        let mut signed = Writer::new();
        signed.put_u8(DIGEST_ALG_SHA256);
        signed.put_bytes("digest", &self.digest)?;
        signed.put_bytes("signature algorithm", SIGNATURE_ALG_ED25519)?;
        signed.put_bytes("signature", &self.signature)?;
        inner.put_bytes("signed info", &signed.into_bytes())?;

        w.put_bytes("credential", &inner.into_bytes())
    }

    fn decode_section(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let _version = r.get_u8()?;
        let _reserved = r.get_u8()?;
        let _options = r.get_u16()?;
        let signer_handle = r.get_bytes("signer handle", MAX_HANDLE_LEN)?.to_vec();
        let signer_index = r.get_u32()?;
        let _credential_type = r.get_bytes("credential type", MAX_CREDENTIAL_FIELD)?;
        let signed_info = r.get_bytes("signed info", MAX_CREDENTIAL_FIELD)?;
        r.finish()?;

        let mut s = Reader::new(signed_info);
        let _digest_alg = s.get_u8()?;
        let digest = s.get_bytes("digest", MAX_CREDENTIAL_FIELD)?.to_vec();
        let _signature_alg = s.get_bytes("signature algorithm", MAX_CREDENTIAL_FIELD)?;
        let signature = s.get_bytes("signature", MAX_CREDENTIAL_FIELD)?.to_vec();
        s.finish()?;

        Ok(Self {
            signer_handle,
            signer_index,
            digest,
            signature,
        })
    }
}

/// Body of a create-handle request: the handle and its initial values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateHandleRequest {
    pub handle: Vec<u8>,
    pub values: Vec<HandleValue>,
}

impl CreateHandleRequest {
    pub fn new(handle: Vec<u8>, values: Vec<HandleValue>) -> Result<Self> {
        if handle.len() > MAX_HANDLE_LEN {
            return Err(WireError::TooLarge {
                field: "handle",
                len: handle.len(),
                limit: MAX_HANDLE_LEN,
            });
        }
        Ok(Self { handle, values })
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        w.put_bytes("handle", &self.handle)?;
        let count = u32::try_from(self.values.len()).map_err(|_| WireError::TooLarge {
            field: "values",
            len: self.values.len(),
            limit: MAX_VALUES as usize,
        })?;
        w.put_u32(count);
        for value in &self.values {
            value.encode(&mut w)?;
        }
        Ok(w.into_bytes())
    }

    fn decode_body(body: &[u8]) -> Result<Self> {
        let mut r = Reader::new(body);
        let handle = r.get_bytes("handle", MAX_HANDLE_LEN)?.to_vec();
        let count = r.get_u32()?;
        if count > MAX_VALUES {
            return Err(WireError::TooLarge {
                field: "values",
                len: count as usize,
                limit: MAX_VALUES as usize,
            });
        }
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(HandleValue::decode(&mut r)?);
        }
        r.finish()?;
        Ok(Self { handle, values })
    }
}

/// Digest a credential signs.
pub fn signing_digest(header: &[u8], body: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(header);
    hasher.update(body);
    hasher.finalize().into()
}

/// Encoded header and body awaiting a credential.
#[derive(Debug, Clone)]
pub struct UnsignedRequest {
    request_id: u32,
    header: Vec<u8>,
    body: Vec<u8>,
}

impl UnsignedRequest {
    pub fn create_handle(
        request_id: u32,
        expiration: u32,
        request: &CreateHandleRequest,
    ) -> Result<Self> {
        let body = request.encode_body()?;
        let header = Header {
            op_code: OC_CREATE_HANDLE,
            response_code: ResponseCode::Reserved,
            op_flags: 0,
            site_info_serial: 0,
            recursion_count: 0,
            expiration,
            body_length: body.len() as u32,
        };
        let mut w = Writer::with_capacity(HEADER_LEN);
        header.encode(&mut w);
        Ok(Self {
            request_id,
            header: w.into_bytes(),
            body,
        })
    }

    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    pub fn digest(&self) -> [u8; 32] {
        signing_digest(&self.header, &self.body)
    }

    /// Complete frame, envelope included.
    pub fn into_frame(self, credential: Option<&Credential>) -> Result<Vec<u8>> {
        let mut message = Writer::with_capacity(HEADER_LEN + self.body.len() + 256);
        message.put_raw(&self.header);
        message.put_raw(&self.body);
        match credential {
            Some(credential) => credential.encode_section(&mut message)?,
            None => message.put_u32(0),
        }
        frame(self.request_id, &message.into_bytes())
    }
}

fn frame(request_id: u32, message: &[u8]) -> Result<Vec<u8>> {
    if message.len() > MAX_MESSAGE_LEN {
        return Err(WireError::TooLarge {
            field: "message",
            len: message.len(),
            limit: MAX_MESSAGE_LEN,
        });
    }
    let mut w = Writer::with_capacity(ENVELOPE_LEN + message.len());
    Envelope::new(request_id, message.len() as u32).encode(&mut w);
    w.put_raw(message);
    Ok(w.into_bytes())
}

/// Splits a frame into envelope, header, body and credential bytes.
struct Parts<'a> {
    envelope: Envelope,
    header: Header,
    header_bytes: &'a [u8],
    body: &'a [u8],
    credential: &'a [u8],
}

fn split_frame(frame: &[u8]) -> Result<Parts<'_>> {
    let mut r = Reader::new(frame);
    let envelope = Envelope::decode(r.get_raw(ENVELOPE_LEN)?)?;
    let message = r.rest();
    if message.len() != envelope.message_length as usize {
        return Err(WireError::LengthMismatch {
            declared: envelope.message_length as usize,
            actual: message.len(),
        });
    }

    let mut m = Reader::new(message);
    let header_bytes = m.get_raw(HEADER_LEN)?;
    let header = Header::decode(&mut Reader::new(header_bytes))?;
    let body = m.get_raw(header.body_length as usize)?;
    let credential = if m.remaining() == 0 {
        &[][..]
    } else {
        m.get_bytes("credential", MAX_CREDENTIAL_FIELD * 4)?
    };
    m.finish()?;

    Ok(Parts {
        envelope,
        header,
        header_bytes,
        body,
        credential,
    })
}

/// A create request as seen by the receiving server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRequest {
    pub envelope: Envelope,
    pub header: Header,
    pub request: CreateHandleRequest,
    pub credential: Option<Credential>,
    /// Digest recomputed from the received header and body.
    pub digest: [u8; 32],
}

pub fn decode_create_request(frame: &[u8]) -> Result<DecodedRequest> {
    let parts = split_frame(frame)?;
    if parts.header.op_code != OC_CREATE_HANDLE {
        return Err(WireError::UnexpectedOpCode(parts.header.op_code));
    }
    let request = CreateHandleRequest::decode_body(parts.body)?;
    let credential = if parts.credential.is_empty() {
        None
    } else {
        Some(Credential::decode_section(parts.credential)?)
    };
    Ok(DecodedRequest {
        envelope: parts.envelope,
        header: parts.header,
        request,
        credential,
        digest: signing_digest(parts.header_bytes, parts.body),
    })
}

/// What a response body carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    /// No body at all.
    Empty,
    /// Handle confirmed by a successful create.
    Handle(String),
    /// Server-provided error description.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: u32,
    pub op_code: u32,
    pub code: ResponseCode,
    pub payload: ResponsePayload,
}

impl Response {
    pub fn success(request_id: u32, handle: impl Into<String>) -> Self {
        Self {
            request_id,
            op_code: OC_CREATE_HANDLE,
            code: ResponseCode::Success,
            payload: ResponsePayload::Handle(handle.into()),
        }
    }

    pub fn error(request_id: u32, code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            request_id,
            op_code: OC_CREATE_HANDLE,
            code,
            payload: ResponsePayload::Error(message.into()),
        }
    }

    pub fn bare(request_id: u32, code: ResponseCode) -> Self {
        Self {
            request_id,
            op_code: OC_CREATE_HANDLE,
            code,
            payload: ResponsePayload::Empty,
        }
    }

    pub fn encode(&self, expiration: u32) -> Result<Vec<u8>> {
        let mut body = Writer::new();
        match &self.payload {
            ResponsePayload::Empty => {}
            ResponsePayload::Handle(handle) => body.put_bytes("handle", handle.as_bytes())?,
            ResponsePayload::Error(message) => {
                body.put_bytes("error message", message.as_bytes())?
            }
        }
        let body = body.into_bytes();
        let header = Header {
            op_code: self.op_code,
            response_code: self.code,
            op_flags: 0,
            site_info_serial: 0,
            recursion_count: 0,
            expiration,
            body_length: body.len() as u32,
        };
        let mut message = Writer::with_capacity(HEADER_LEN + body.len() + 4);
        header.encode(&mut message);
        message.put_raw(&body);
        message.put_u32(0);
        frame(self.request_id, &message.into_bytes())
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        let parts = split_frame(frame)?;
        let code = parts.header.response_code;
        let payload = if parts.body.is_empty() {
            ResponsePayload::Empty
        } else if code.is_success() {
            let mut r = Reader::new(parts.body);
            let handle = r.get_bytes("handle", MAX_HANDLE_LEN)?;
            r.finish()?;
            let handle =
                std::str::from_utf8(handle).map_err(|_| WireError::InvalidUtf8("handle"))?;
            ResponsePayload::Handle(handle.to_string())
        } else {
            let mut r = Reader::new(parts.body);
            let message = r.get_bytes("error message", MAX_ERROR_MESSAGE)?;
            // trailing index list, if any, is not interpreted
            ResponsePayload::Error(String::from_utf8_lossy(message).into_owned())
        };
        Ok(Self {
            request_id: parts.envelope.request_id,
            op_code: parts.header.op_code,
            code,
            payload,
        })
    }
}
