//! Error types for the handle wire codec

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of input: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{field} is {len} bytes, limit is {limit}")]
    TooLarge {
        field: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("unsupported protocol version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("unexpected op code {0}")]
    UnexpectedOpCode(u32),

    #[error("invalid ttl type {0}")]
    InvalidTtlType(u8),

    #[error("declared length {declared} does not match {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
}

pub type Result<T> = std::result::Result<T, WireError>;
