//! Packet header codec.
//!
//! The protocol's only wire entity. A header is a type byte (request or
//! response code in bits 0-6, variable-size flag in bit 7) followed by
//! either one inline payload byte (flag clear) or a 4-byte little-endian
//! payload length (flag set). A variable payload of exactly that many raw
//! bytes then follows separately on the wire; there is no padding and no
//! checksum.
//!
//! Encoding is trivial; decoding is incremental, one byte at a time, via
//! [`HeaderDecoder`], because headers arrive over transports that only
//! hand out single bytes.

use heapless::Vec;

/// Bit 7 of the type byte: payload length is carried explicitly.
pub const VARIABLE_FLAG: u8 = 0x80;

/// Longest possible encoding: type byte plus 4 length bytes.
pub const MAX_ENCODED_LEN: usize = 5;

/// Extract the 7-bit code from a raw type byte.
#[inline]
pub fn code_of_type_byte(byte: u8) -> u8 {
    byte & !VARIABLE_FLAG
}

/// The payload description carried by a header.
///
/// A fixed-size header has no length field at all; the inline byte *is*
/// the payload, so no caller can mistake one representation for the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Payload {
    /// Single payload byte carried inside the header.
    Inline(u8),
    /// Length of a payload that follows separately, 0..2^32-1 bytes.
    Size(u32),
}

/// A request or response packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketHeader {
    code: u8,
    payload: Payload,
}

impl PacketHeader {
    /// Fixed-size header: `code` with one inline payload byte.
    pub fn fixed(code: u8, value: u8) -> Self {
        Self {
            code: code & !VARIABLE_FLAG,
            payload: Payload::Inline(value),
        }
    }

    /// Variable-size header: `code` with an explicit payload length.
    pub fn variable(code: u8, size: u32) -> Self {
        Self {
            code: code & !VARIABLE_FLAG,
            payload: Payload::Size(size),
        }
    }

    /// The 7-bit request/response code.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// The payload description.
    pub fn payload(&self) -> Payload {
        self.payload
    }

    /// Whether the payload travels separately with an explicit length.
    pub fn is_variable(&self) -> bool {
        matches!(self.payload, Payload::Size(_))
    }

    /// Payload length, defined only for variable-size headers.
    pub fn payload_size(&self) -> Option<u32> {
        match self.payload {
            Payload::Inline(_) => None,
            Payload::Size(size) => Some(size),
        }
    }

    /// The single type byte: code plus the variable-size flag.
    pub fn type_byte(&self) -> u8 {
        match self.payload {
            Payload::Inline(_) => self.code,
            Payload::Size(_) => self.code | VARIABLE_FLAG,
        }
    }

    /// Encode to wire bytes: type byte, then the inline byte or the
    /// length LSB-first.
    pub fn encode(&self) -> Vec<u8, MAX_ENCODED_LEN> {
        let mut out = Vec::new();
        // Capacity is MAX_ENCODED_LEN, so none of these pushes can fail.
        let _ = out.push(self.type_byte());
        match self.payload {
            Payload::Inline(value) => {
                let _ = out.push(value);
            }
            Payload::Size(size) => {
                let _ = out.extend_from_slice(&size.to_le_bytes());
            }
        }
        out
    }
}

/// Outcome of feeding one byte to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// The header is not complete yet.
    NeedMore,
    /// The header is complete; the decoder is reset for the next one.
    Complete(PacketHeader),
}

enum DecodeState {
    TypeByte,
    InlineByte { code: u8 },
    SizeBytes { code: u8, bytes: [u8; 4], have: u8 },
}

/// Incremental header decoder.
///
/// Feed bytes with [`HeaderDecoder::push`] as they arrive; any sequence
/// of received bytes decodes to some header, so the decoder itself cannot
/// fail; only the transport underneath can.
pub struct HeaderDecoder {
    state: DecodeState,
}

impl HeaderDecoder {
    pub const fn new() -> Self {
        Self {
            state: DecodeState::TypeByte,
        }
    }

    /// Consume one wire byte.
    pub fn push(&mut self, byte: u8) -> Step {
        match self.state {
            DecodeState::TypeByte => {
                let code = code_of_type_byte(byte);
                if byte & VARIABLE_FLAG != 0 {
                    self.state = DecodeState::SizeBytes {
                        code,
                        bytes: [0; 4],
                        have: 0,
                    };
                } else {
                    self.state = DecodeState::InlineByte { code };
                }
                Step::NeedMore
            }
            DecodeState::InlineByte { code } => {
                self.state = DecodeState::TypeByte;
                Step::Complete(PacketHeader::fixed(code, byte))
            }
            DecodeState::SizeBytes {
                code,
                mut bytes,
                have,
            } => {
                bytes[have as usize] = byte;
                if have == 3 {
                    self.state = DecodeState::TypeByte;
                    Step::Complete(PacketHeader::variable(code, u32::from_le_bytes(bytes)))
                } else {
                    self.state = DecodeState::SizeBytes {
                        code,
                        bytes,
                        have: have + 1,
                    };
                    Step::NeedMore
                }
            }
        }
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new()
    }
}
