//! Reserved wire code values.
//!
//! The request/response code space is 7 bits (bit 7 of the type byte is
//! the variable-size flag). Codes below `0x08` are reserved for the
//! bridge itself and the server's core operations; everything else is an
//! opaque storage operation relayed verbatim to the PC.

/// Version of the packet protocol. Reported by the ready query and by the
/// `CR_GET_PROTOCOL_VERSION` vendor control request.
pub const PROTOCOL_VERSION: u8 = 1;

/// Presence probe. Consists of a bare type byte with no payload; the
/// bridge accepts it silently so a host driver can test for the device
/// without provoking a reply.
pub const REQUEST_AVR_PRESENCE: u8 = 0x00;

/// Meta-request answered by the bridge itself, never forwarded. Carries a
/// single sub-opcode byte, inline or as a 1-byte variable payload.
pub const REQUEST_AVR: u8 = 0x01;

/// Interactive line input. Arrives in bursts, so the diagnostics layer
/// keeps quiet about it.
pub const REQUEST_READ_STRING: u8 = 0x02;

/// Single-byte read from an open file. Quiet, arrives in bursts.
pub const REQUEST_BYTE_GET: u8 = 0x03;

/// Single-byte write to an open file. Quiet, arrives in bursts.
pub const REQUEST_BYTE_PUT: u8 = 0x04;

/// Whole-file operation. Quiet, moves a lot of data.
pub const REQUEST_FILE_OP: u8 = 0x05;

/// Block get/put operation. Quiet, moves a lot of data.
pub const REQUEST_BLOCK_OP: u8 = 0x06;

/// `REQUEST_AVR` sub-opcode: is the bridge ready? Answered with
/// [`RESPONSE_YES`] or [`RESPONSE_NO`] carrying [`PROTOCOL_VERSION`].
pub const REQUEST_AVR_READY: u8 = 0x00;

/// `REQUEST_AVR` sub-opcode: deliberately provoke an error packet. A
/// self-test path for the micro-side client.
pub const REQUEST_AVR_ERROR: u8 = 0x01;

/// Reserved response code; never sent.
pub const RESPONSE_RESERVED: u8 = 0x00;

/// Affirmative response to a yes/no question.
pub const RESPONSE_YES: u8 = 0x01;

/// Negative response to a yes/no question.
pub const RESPONSE_NO: u8 = 0x02;

/// Response carrying plain data.
pub const RESPONSE_DATA: u8 = 0x03;

/// Error packet. Variable payload: `0x00` marker, numeric error code,
/// then a NUL-terminated diagnostic message.
pub const RESPONSE_ERROR: u8 = 0x04;

/// Error code used for protocol violations the bridge reports itself.
pub const ERROR_CODE_PROTOCOL: u8 = 255;

/// Vendor control request: return the protocol version byte.
pub const CR_GET_PROTOCOL_VERSION: u8 = 0x00;

/// Vendor control request: toggle verbose diagnostic output.
pub const CR_SET_VERBOSE: u8 = 0x01;

/// Whether diagnostics should stay quiet about a request code: either it
/// tends to come in rapid bursts or it moves a lot of data, and tracing
/// every one drowns the log.
pub fn is_quiet(code: u8) -> bool {
    matches!(
        code,
        REQUEST_READ_STRING
            | REQUEST_BYTE_GET
            | REQUEST_BYTE_PUT
            | REQUEST_FILE_OP
            | REQUEST_BLOCK_OP
    )
}
