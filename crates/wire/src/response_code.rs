//! Response codes returned by handle servers.

use std::fmt;

macro_rules! response_codes {
    ($( $variant:ident = $code:literal => $message:literal, )+) => {
        /// Response code carried in every message header.
        ///
        /// Codes this crate does not know are preserved in `Unknown`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ResponseCode {
            $( $variant, )+
            Unknown(u32),
        }

        impl ResponseCode {
            pub fn from_u32(code: u32) -> Self {
                match code {
                    $( $code => ResponseCode::$variant, )+
                    other => ResponseCode::Unknown(other),
                }
            }

            pub fn as_u32(self) -> u32 {
                match self {
                    $( ResponseCode::$variant => $code, )+
                    ResponseCode::Unknown(other) => other,
                }
            }

            /// Human readable description of the code.
            pub fn message(self) -> String {
                match self {
                    $( ResponseCode::$variant => $message.to_string(), )+
                    ResponseCode::Unknown(other) => format!("unrecognized response code {other}"),
                }
            }
        }
    };
}

response_codes! {
    Reserved = 0 => "reserved",
    Success = 1 => "success",
    Error = 2 => "unknown error",
    ServerTooBusy = 3 => "server too busy",
    ProtocolError = 4 => "protocol error",
    OperationNotSupported = 5 => "operation not supported",
    RecursionCountTooHigh = 6 => "recursion count too high",
    ServerReadOnly = 7 => "server read-only",
    HandleNotFound = 100 => "handle not found",
    HandleAlreadyExists = 101 => "handle already exists",
    InvalidHandle = 102 => "invalid handle",
    ValueNotFound = 200 => "value not found",
    ValueAlreadyExists = 201 => "value already exists",
    InvalidValue = 202 => "invalid value",
    ExpiredSiteInfo = 300 => "expired site info",
    ServerNotResponsible = 301 => "server not responsible for handle",
    ServiceReferral = 302 => "service referral",
    PrefixReferral = 303 => "prefix referral",
    InvalidAdmin = 400 => "invalid admin",
    InsufficientPermissions = 401 => "insufficient permissions",
    AuthenticationNeeded = 402 => "authentication needed",
    AuthenticationFailed = 403 => "authentication failed",
    InvalidCredential = 404 => "invalid credential",
    AuthenticationTimeout = 405 => "authentication timed out",
    UnableToAuthenticate = 406 => "unable to authenticate",
    SessionTimeout = 500 => "session timeout",
    SessionFailed = 501 => "session failed",
    NoSessionKey = 502 => "no session key",
    SessionNotSupported = 503 => "session not supported",
    SessionKeyInvalid = 504 => "session key invalid",
    Trying = 900 => "trying",
    Forwarded = 901 => "forwarded",
    SessionMessageRejected = 902 => "session message rejected",
}

impl ResponseCode {
    pub fn is_success(self) -> bool {
        self == ResponseCode::Success
    }
}

impl From<u32> for ResponseCode {
    fn from(code: u32) -> Self {
        ResponseCode::from_u32(code)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.as_u32())
    }
}
