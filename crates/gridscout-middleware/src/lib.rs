//! `gridscout-middleware` – everything that crosses a process boundary.
//!
//! # Modules
//!
//! - [`protocol`] – `|`-delimited text framing shared with the companion app
//!   and the microcontroller.
//! - [`transport`] – [`Transport`][transport::Transport], the byte-level seam,
//!   plus a line-oriented stream implementation for TCP sockets.
//! - [`bridge`] – [`MessagingBridge`][bridge::MessagingBridge]: typed
//!   send/receive over a transport, sensor-data waits, outbound pacing.
//! - [`bus`] – in-process telemetry [`EventBus`][bus::EventBus].

pub mod bridge;
pub mod bus;
pub mod protocol;
pub mod transport;

pub use bridge::{BridgeConfig, BridgeError, MessagingBridge};
pub use bus::{EventBus, Topic, TopicReceiver};
pub use protocol::{InboundMessage, OutboundMessage, ProtocolError};
pub use transport::{StreamTransport, TcpTransport, Transport};
