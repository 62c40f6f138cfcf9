//! Typed messaging over a [`Transport`].
//!
//! [`MessagingBridge`] is the robot's single connection to the relay that
//! fans traffic out to the microcontroller and the companion app.  It owns
//! its transport; whoever constructs it decides whether that is a socket or
//! an in-memory stream.
//!
//! Outbound frames can be paced with a [`governor`] rate limiter so the relay
//! is not flooded.  Waiting for sensor data is always bounded by a deadline.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use gridscout_types::{ScoutError, SensorReadings};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::protocol::{InboundMessage, OutboundMessage, ProtocolError};
use crate::transport::{TcpTransport, Transport};

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out")]
    Timeout,

    #[error("connection closed by peer")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<BridgeError> for ScoutError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout => ScoutError::SensorTimeout,
            other => ScoutError::Bridge(other.to_string()),
        }
    }
}

/// Connection settings for [`MessagingBridge::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Outbound frames per second; `None` disables pacing.
    pub frames_per_second: Option<NonZeroU32>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "192.168.26.1".to_string(),
            port: 2626,
            connect_timeout: Duration::from_secs(5),
            frames_per_second: NonZeroU32::new(2),
        }
    }
}

pub struct MessagingBridge {
    transport: Box<dyn Transport>,
    pacer: Option<DefaultDirectRateLimiter>,
}

impl MessagingBridge {
    /// Wrap an already-open transport.  No pacing.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            pacer: None,
        }
    }

    /// Limit outbound traffic to `per_second` frames.
    pub fn with_pacing(mut self, per_second: NonZeroU32) -> Self {
        self.pacer = Some(RateLimiter::direct(Quota::per_second(per_second)));
        self
    }

    /// Open a TCP connection as described by `config`.
    pub async fn connect(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let transport =
            TcpTransport::connect(&config.host, config.port, config.connect_timeout).await?;
        let bridge = Self::new(Box::new(transport));
        Ok(match config.frames_per_second {
            Some(rate) => bridge.with_pacing(rate),
            None => bridge,
        })
    }

    pub async fn send(&mut self, message: &OutboundMessage) -> Result<(), BridgeError> {
        let frame = message.encode()?;
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }
        self.transport.send_frame(&frame).await
    }

    /// Next inbound message.  Blank lines are skipped.
    pub async fn recv(&mut self) -> Result<InboundMessage, BridgeError> {
        loop {
            let Some(line) = self.transport.recv_line().await? else {
                return Err(BridgeError::Closed);
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(InboundMessage::parse(&line)?);
        }
    }

    /// Wait for the next `SDATA` frame, discarding everything else, until
    /// `deadline`.
    pub async fn recv_sensor_data(
        &mut self,
        deadline: Instant,
    ) -> Result<SensorReadings, BridgeError> {
        debug!("waiting for sensor data");
        tokio::time::timeout_at(deadline, async {
            loop {
                match self.recv().await {
                    Ok(InboundMessage::SensorData(readings)) => return Ok(readings),
                    Ok(other) => debug!(?other, "ignoring while waiting for sensor data"),
                    Err(BridgeError::Protocol(err)) => {
                        warn!(error = %err, "discarding malformed frame");
                    }
                    Err(err) => return Err(err),
                }
            }
        })
        .await
        .map_err(|_| BridgeError::Timeout)?
    }

    pub async fn close(&mut self) -> Result<(), BridgeError> {
        self.transport.close().await
    }
}
