//! On-demand payload byte production.
//!
//! Synthesized responses (error packets, mostly) are streamed through the
//! forwarding engine exactly like real inbound data, but there is no
//! buffer to stream from; each byte is derived from a running index
//! instead. [`PayloadSource`] is the closed set of payload origins the
//! engine dispatches over.

use crate::error::Result;
use crate::transport::ByteTransport;

/// Lazily produced payload of a synthesized error packet.
///
/// The wire layout is fixed: byte 0 is a `0x00` marker, byte 1 the
/// numeric error code, and the rest the diagnostic message including its
/// NUL terminator.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorPayload {
    code: u8,
    message: &'static str,
    index: u32,
}

impl ErrorPayload {
    pub fn new(code: u8, message: &'static str) -> Self {
        Self {
            code,
            message,
            index: 0,
        }
    }

    /// Total bytes this payload occupies on the wire: marker + code +
    /// message + terminator.
    pub fn wire_size(&self) -> u32 {
        1 + 1 + self.message.len() as u32 + 1
    }

    fn byte_at(&self, index: u32) -> u8 {
        match index {
            0 => 0x00,
            1 => self.code,
            _ => {
                let offset = (index - 2) as usize;
                // Past the end of the message is the NUL terminator.
                self.message.as_bytes().get(offset).copied().unwrap_or(0)
            }
        }
    }

    /// Produce the next byte and advance the cursor.
    pub fn next_byte(&mut self) -> u8 {
        let value = self.byte_at(self.index);
        self.index += 1;
        value
    }
}

/// Transport type for sources that carry no real stream. Uninhabited, so
/// `PayloadSource::<NoTransport>::Synthesized(..)` costs nothing and can
/// never be confused for a live link.
#[derive(Debug, Clone, Copy)]
pub enum NoTransport {}

impl ByteTransport for NoTransport {
    fn receive_byte(&mut self) -> Result<u8> {
        match *self {}
    }

    fn send_byte(&mut self, _byte: u8) -> Result<()> {
        match *self {}
    }
}

/// Where the forwarding engine pulls payload bytes from.
pub enum PayloadSource<'a, T> {
    /// A live inbound stream on another transport.
    Transport(&'a mut T),
    /// A synthesized error payload derived byte by byte.
    Synthesized(ErrorPayload),
    /// No payload at all. Fixed-size responses never reach the payload
    /// loop, so this is never asked for a byte.
    Empty,
}

impl<T: ByteTransport> PayloadSource<'_, T> {
    pub(crate) fn next_byte(&mut self) -> Result<u8> {
        match self {
            PayloadSource::Transport(transport) => transport.receive_byte(),
            PayloadSource::Synthesized(payload) => Ok(payload.next_byte()),
            PayloadSource::Empty => Ok(0),
        }
    }
}
