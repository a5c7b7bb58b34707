//! Native-framed socket mode: the raw FMS protocol over TCP or TLS.
//!
//! One transaction is one exchange: flush whatever stale bytes a prior
//! exchange left in the receive buffer, write the packed request frame,
//! ride out the optional standalone ACK (a leading STX is already the
//! response), then wait for the fixed-size response frame. The device may
//! take minutes to answer while the cardholder interacts with it, so the
//! response wait is bounded generously.

use crate::{SocketConfig, SocketError};
use bytes::Bytes;
use ecrsim_core::constants::{ACK_WAIT_MS, POLL_INTERVAL_MS, SOCKET_RESPONSE_TIMEOUT_SECS};
use ecrsim_protocol::{FmsFrameCodec, SocketItem};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Connect timeout for the TCP handshake.
const CONNECT_TIMEOUT_SECS: u64 = 5;

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type FramedStream = Framed<Box<dyn AsyncStream>, FmsFrameCodec>;

/// Client for the raw framed protocol.
pub struct FramedClient {
    config: SocketConfig,
    framed: Option<FramedStream>,
    response_timeout: Duration,
}

impl FramedClient {
    #[must_use]
    pub fn new(config: SocketConfig) -> Self {
        FramedClient {
            config,
            framed: None,
            response_timeout: Duration::from_secs(SOCKET_RESPONSE_TIMEOUT_SECS),
        }
    }

    /// Override the response wait bound. Tests use short bounds; the
    /// production default is the 10-minute safety net.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Replace the endpoint parameters. Takes effect on the next connect.
    pub fn update_config(&mut self, config: SocketConfig) {
        self.config = config;
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Open the TCP connection, wrapping it in TLS when configured.
    ///
    /// # Errors
    /// `ConnectionFailed` on timeout, `Io`/`Tls` on handshake failure.
    pub async fn connect(&mut self) -> Result<(), SocketError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!(addr = %addr, ssl = self.config.enable_ssl, "connecting native socket");

        let stream = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| SocketError::ConnectionFailed(format!("connect timeout to {addr}")))??;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {e}");
        }

        let boxed: Box<dyn AsyncStream> = if self.config.enable_ssl {
            // Simulator-grade TLS: lab devices present self-signed
            // certificates, so validation stays off.
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tls = connector
                .connect(&self.config.host, stream)
                .await
                .map_err(|e| SocketError::ConnectionFailed(format!("TLS handshake: {e}")))?;
            Box::new(tls)
        } else {
            Box::new(stream)
        };

        self.framed = Some(Framed::new(boxed, FmsFrameCodec::new()));
        info!("native socket connected");
        Ok(())
    }

    /// Drop the connection.
    pub async fn close(&mut self) {
        if let Some(mut framed) = self.framed.take() {
            let _ = framed.close().await;
            info!("native socket closed");
        }
    }

    /// Drain stale items sitting in the receive buffer from a prior
    /// exchange, so a leftover response cannot be attributed to the next
    /// request. Returns the number of discarded items.
    async fn flush_stale(framed: &mut FramedStream) -> usize {
        let mut flushed = 0;
        loop {
            match tokio::time::timeout(Duration::from_millis(POLL_INTERVAL_MS), framed.next())
                .await
            {
                Ok(Some(Ok(item))) => {
                    flushed += 1;
                    warn!(?item, "flushed stale item from receive buffer");
                }
                Ok(Some(Err(e))) => {
                    warn!("error while flushing stale bytes: {e}");
                    break;
                }
                // EOF or empty buffer both end the flush.
                Ok(None) | Err(_) => break,
            }
        }
        flushed
    }

    /// Send a packed request frame and wait for the framed response.
    ///
    /// Returns the raw response bytes (frame plus any trailing QR bytes)
    /// for the caller's codec to parse.
    ///
    /// # Errors
    /// `NotConnected`, `Nak` when the device rejects the request,
    /// `Timeout` at the response bound, `ConnectionFailed` when the peer
    /// closes mid-exchange.
    pub async fn send_transaction(&mut self, frame: Vec<u8>) -> Result<Bytes, SocketError> {
        let framed = self.framed.as_mut().ok_or(SocketError::NotConnected)?;

        let flushed = Self::flush_stale(framed).await;
        if flushed > 0 {
            warn!(flushed, "stale items discarded before send");
        }

        debug!(bytes = frame.len(), "sending request frame");
        framed.send(frame).await.map_err(SocketError::Protocol)?;

        // Give the device a beat to acknowledge before the first read.
        tokio::time::sleep(Duration::from_millis(ACK_WAIT_MS)).await;

        let deadline = tokio::time::Instant::now() + self.response_timeout;
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or_else(|| {
                    SocketError::Timeout(format!(
                        "no response within {} seconds",
                        self.response_timeout.as_secs()
                    ))
                })?;

            match tokio::time::timeout(remaining, framed.next()).await {
                Ok(Some(Ok(SocketItem::Ack))) => {
                    info!("received ACK, waiting for response frame");
                }
                Ok(Some(Ok(SocketItem::Nak))) => {
                    warn!("received NAK");
                    return Err(SocketError::Nak);
                }
                Ok(Some(Ok(SocketItem::Frame(bytes)))) => {
                    info!(len = bytes.len(), "response frame received");
                    return Ok(bytes);
                }
                Ok(Some(Err(e))) => return Err(SocketError::Protocol(e)),
                Ok(None) => {
                    return Err(SocketError::ConnectionFailed(
                        "connection closed by device".to_string(),
                    ));
                }
                Err(_) => {
                    return Err(SocketError::Timeout(format!(
                        "no response within {} seconds",
                        self.response_timeout.as_secs()
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_connect_is_rejected() {
        let mut client = FramedClient::new(SocketConfig::default());
        let result = client.send_transaction(vec![0x02]).await;
        assert!(matches!(result, Err(SocketError::NotConnected)));
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        // RFC 5737 TEST-NET-1, guaranteed unroutable.
        let config = SocketConfig { host: "192.0.2.1".to_string(), port: 9999, ..Default::default() };
        let mut client = FramedClient::new(config);

        let result = client.connect().await;
        assert!(result.is_err());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn close_when_not_connected_is_safe() {
        let mut client = FramedClient::new(SocketConfig::default());
        client.close().await;
        client.close().await;
        assert!(!client.is_connected());
    }
}
