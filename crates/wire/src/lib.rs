//! Handle Protocol Wire Codec
//!
//! Encodes and decodes the pieces of the handle resolution protocol needed
//! to issue new handles: typed record values, `HS_ADMIN` records, the
//! create-handle request with its public-key credential, and server
//! responses. Both directions are supported so that a simulated server can
//! be built on the same codec.

pub mod admin;
pub mod codec;
pub mod errors;
pub mod message;
pub mod response_code;
pub mod value;

pub use admin::{AdminPermissions, AdminRecord};
pub use errors::*;
pub use message::{
    decode_create_request, signing_digest, CreateHandleRequest, Credential, DecodedRequest,
    Envelope, Header, Response, ResponsePayload, UnsignedRequest, ENVELOPE_LEN,
    MAX_MESSAGE_LEN, OC_CREATE_HANDLE,
};
pub use response_code::ResponseCode;
pub use value::{
    HandleValue, TtlType, ValuePermissions, ValueReference, ADMIN_TYPE, DEFAULT_TTL_SECONDS,
    DESC_TYPE, MAX_HANDLE_LEN, MAX_VALUE_DATA_LEN,
};
