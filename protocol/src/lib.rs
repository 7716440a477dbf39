//! # Bridge Protocol Library
//!
//! Core of a firmware that bridges a legacy 8-bit microcomputer's user
//! port to a modern PC over a USB bulk link, relaying a simple packet
//! protocol between the two:
//!
//! - **Packet Headers**: the protocol's one wire entity, with an
//!   incremental single-byte decoder
//! - **Byte Transports**: the strobe/acknowledge user-port handshake and
//!   the bulk endpoint pair, behind one narrow trait
//! - **Forwarding Engine**: O(1) byte-at-a-time relay, both directions
//! - **Session Machine**: one request/response exchange per iteration,
//!   with local dispatch of the bridge's own meta-requests
//!
//! ## Architecture
//!
//! ```text
//! User Port ─► HandshakeTransport ─► forward_packet ─► BulkTransport ─► PC
//!                                         │
//!                                      Session
//!                                         │
//! User Port ◄─ HandshakeTransport ◄─ forward_packet ◄─ BulkTransport ◄─ PC
//! ```
//!
//! ## Relay Strategy
//!
//! The bridge never buffers a packet. Payloads may claim up to 2^32-1
//! bytes, far beyond any sensible firmware buffer, so:
//! 1. Each payload byte is received and immediately forwarded
//! 2. Headers are decoded incrementally as single bytes arrive
//! 3. Synthesized responses derive their bytes from a running index
//! 4. Memory use is constant regardless of payload size

#![cfg_attr(not(feature = "std"), no_std)]

pub mod bulk;
pub mod codes;
pub mod dispatch;
pub mod error;
pub mod forward;
pub mod handshake;
pub mod header;
pub mod session;
pub mod source;
pub mod status;
pub mod transport;

// Re-export main types for convenience
pub use bulk::{BulkIn, BulkOut, BulkTransport, EndpointStatus};
pub use codes::PROTOCOL_VERSION;
pub use error::{Error, Result};
pub use forward::{forward_packet, ProgressHint, DUMP_WINDOW};
pub use handshake::{DataBus, HandshakeLine, HandshakeTransport};
pub use header::{HeaderDecoder, PacketHeader, Payload, Step, MAX_ENCODED_LEN, VARIABLE_FLAG};
pub use session::{Outcome, Session};
pub use source::{ErrorPayload, NoTransport, PayloadSource};
pub use status::{Lamps, NullIndicator, StatusIndicator};
pub use transport::{BackgroundTask, ByteTransport, HostLink, MicroLink};

/// Library version for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
