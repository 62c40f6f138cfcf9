//! Byte-level transport seam.
//!
//! The [`MessagingBridge`][crate::bridge::MessagingBridge] talks to the
//! outside world only through [`Transport`].  Production code uses a TCP
//! socket via [`TcpTransport`]; tests plug in an in-memory
//! [`tokio::io::duplex`] pair through the same [`StreamTransport`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::bridge::BridgeError;

/// A bidirectional, line-oriented text channel.
#[async_trait]
pub trait Transport: Send {
    /// Write one frame and flush.  No terminator is appended.
    async fn send_frame(&mut self, frame: &str) -> Result<(), BridgeError>;

    /// Read the next line without its terminator.  `Ok(None)` on end of
    /// stream.
    async fn recv_line(&mut self) -> Result<Option<String>, BridgeError>;

    /// Shut the write side down.
    async fn close(&mut self) -> Result<(), BridgeError>;
}

/// [`Transport`] over any async byte stream.
pub struct StreamTransport<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read),
            writer: write,
        }
    }
}

pub type TcpTransport = StreamTransport<TcpStream>;

impl TcpTransport {
    /// Open a TCP connection to `host:port`, giving up after `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, BridgeError> {
        let addr = format!("{host}:{port}");
        info!(%addr, "opening connection");
        let stream = connect_within(&addr, timeout, TcpStream::connect(&addr)).await?;
        stream.set_nodelay(true)?;
        info!(%addr, "connection established");
        Ok(Self::new(stream))
    }
}

async fn connect_within<T>(
    addr: &str,
    timeout: Duration,
    connect: impl Future<Output = std::io::Result<T>>,
) -> Result<T, BridgeError> {
    tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| BridgeError::ConnectTimeout {
            addr: addr.to_string(),
            timeout,
        })?
        .map_err(|source| BridgeError::Connect {
            addr: addr.to_string(),
            source,
        })
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send_frame(&mut self, frame: &str) -> Result<(), BridgeError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        debug!(frame, "sent");
        Ok(())
    }

    async fn recv_line(&mut self) -> Result<Option<String>, BridgeError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        debug!(line = %line, "received");
        Ok(Some(line))
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        self.writer.shutdown().await?;
        info!("connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn frames_are_written_without_terminator() -> Result<(), Box<dyn std::error::Error>> {
        let (local, mut remote) = tokio::io::duplex(256);
        let mut transport = StreamTransport::new(local);

        transport.send_frame("Alg|Ard|F|").await?;
        transport.send_frame("Alg|Ard|L|").await?;
        transport.close().await?;

        let mut received = String::new();
        remote.read_to_string(&mut received).await?;
        assert_eq!(received, "Alg|Ard|F|Alg|Ard|L|");
        Ok(())
    }

    #[tokio::test]
    async fn lines_are_split_and_trimmed() -> Result<(), Box<dyn std::error::Error>> {
        let (local, mut remote) = tokio::io::duplex(256);
        let mut transport = StreamTransport::new(local);

        remote.write_all(b"EX_START\r\nSDATA|1, 2, 3, 4, 5, 6\n").await?;
        drop(remote);

        assert_eq!(transport.recv_line().await?.as_deref(), Some("EX_START"));
        assert_eq!(
            transport.recv_line().await?.as_deref(),
            Some("SDATA|1, 2, 3, 4, 5, 6")
        );
        assert_eq!(transport.recv_line().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn connect_reports_refused_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(BridgeError::Connect { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn connect_gives_up_after_the_timeout() {
        let result = connect_within(
            "192.168.26.1:2626",
            Duration::from_secs(5),
            std::future::pending::<std::io::Result<()>>(),
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, BridgeError::ConnectTimeout { .. }));

        let scout = gridscout_types::ScoutError::from(err);
        assert!(
            matches!(&scout, gridscout_types::ScoutError::Bridge(msg) if msg.contains("192.168.26.1:2626")),
            "{scout}"
        );
    }
}
