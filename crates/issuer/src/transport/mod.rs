//! How framed requests reach a handle server.

mod stub;
mod tcp;

pub use stub::StubHandleService;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use hdl_wire::WireError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid frame: {0}")]
    Frame(#[from] WireError),
}

/// One request frame in, one response frame out.
#[async_trait]
pub trait HandleTransport: Send + Sync {
    async fn exchange(&self, frame: Vec<u8>) -> Result<Vec<u8>, TransportError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}
