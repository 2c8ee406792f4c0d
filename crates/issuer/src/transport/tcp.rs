use super::{HandleTransport, TransportError};
use crate::settings::ServerSettings;
use async_trait::async_trait;
use hdl_wire::{Envelope, ENVELOPE_LEN};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Opens a fresh connection per request.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl TcpTransport {
    pub fn new(
        address: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
            request_timeout,
        }
    }

    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::new(
            settings.address.clone(),
            settings.connect_timeout,
            settings.request_timeout,
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn round_trip(stream: &mut TcpStream, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        stream.write_all(frame).await?;
        stream.flush().await?;

        let mut response = vec![0u8; ENVELOPE_LEN];
        stream.read_exact(&mut response).await?;
        let envelope = Envelope::decode(&response)?;

        let message_len = envelope.message_length as usize;
        response.resize(ENVELOPE_LEN + message_len, 0);
        stream.read_exact(&mut response[ENVELOPE_LEN..]).await?;
        Ok(response)
    }
}

#[async_trait]
impl HandleTransport for TcpTransport {
    async fn exchange(&self, frame: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| TransportError::Timeout {
                stage: "connect",
                after: self.connect_timeout,
            })?
            .map_err(|source| TransportError::Connect {
                address: self.address.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        debug!(server = %self.address, bytes = frame.len(), "sending request frame");
        let response = timeout(self.request_timeout, Self::round_trip(&mut stream, &frame))
            .await
            .map_err(|_| TransportError::Timeout {
                stage: "request",
                after: self.request_timeout,
            })??;
        debug!(server = %self.address, bytes = response.len(), "received response frame");
        Ok(response)
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}
