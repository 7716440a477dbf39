//! Local request dispatcher.
//!
//! A handful of request codes are meta-protocol: they concern the bridge
//! itself and must never reach the PC. The presence probe is silently
//! accepted by the session; everything else lands here. Responses,
//! including synthesized error packets, go out through the ordinary
//! forwarding engine, addressed only to the microcomputer side: the most
//! likely failure mode is a timing problem on that very link, so errors
//! are never reported over the host link.

use log::{info, warn};

use crate::codes::{
    ERROR_CODE_PROTOCOL, PROTOCOL_VERSION, REQUEST_AVR, REQUEST_AVR_ERROR, REQUEST_AVR_PRESENCE,
    REQUEST_AVR_READY, RESPONSE_ERROR, RESPONSE_NO, RESPONSE_YES,
};
use crate::error::Result;
use crate::forward::{forward_packet, ProgressHint};
use crate::header::{PacketHeader, Payload};
use crate::source::{ErrorPayload, NoTransport, PayloadSource};
use crate::status::NullIndicator;
use crate::transport::ByteTransport;

/// Requests the session must answer locally instead of forwarding.
pub fn is_local_request(code: u8) -> bool {
    matches!(code, REQUEST_AVR_PRESENCE | REQUEST_AVR)
}

/// Readiness hook for the ready query. There is currently nothing that
/// can make the bridge not ready once it is running, but the negative
/// answer exists on the wire for when there is.
fn bridge_ready() -> bool {
    true
}

/// Send a synthesized error packet to the microcomputer.
pub fn send_error_packet<M>(micro: &mut M, code: u8, message: &'static str) -> Result<()>
where
    M: ByteTransport + ?Sized,
{
    warn!("error response: {} {}", code, message);

    let payload = ErrorPayload::new(code, message);
    let header = PacketHeader::variable(RESPONSE_ERROR, payload.wire_size());
    forward_packet(
        None,
        &header,
        micro,
        PayloadSource::<NoTransport>::Synthesized(payload),
        NullIndicator,
        ProgressHint::NONE,
        false,
    )
}

/// Handle a meta-request addressed to the bridge.
///
/// The sub-opcode arrives either inline or as a 1-byte variable payload;
/// any other declared size is a protocol violation, answered in-band.
pub fn handle_meta_request<M>(request: &PacketHeader, micro: &mut M) -> Result<()>
where
    M: ByteTransport + ?Sized,
{
    let sub_opcode = match request.payload() {
        Payload::Inline(value) => value,
        Payload::Size(1) => micro.receive_byte()?,
        Payload::Size(_) => {
            return send_error_packet(
                micro,
                ERROR_CODE_PROTOCOL,
                "Bad REQUEST_AVR payload size",
            );
        }
    };

    match sub_opcode {
        REQUEST_AVR_READY => {
            let ready = bridge_ready();
            info!("ready query: {}", ready);

            let code = if ready { RESPONSE_YES } else { RESPONSE_NO };
            let response = PacketHeader::fixed(code, PROTOCOL_VERSION);
            forward_packet(
                None,
                &response,
                micro,
                PayloadSource::<NoTransport>::Empty,
                NullIndicator,
                ProgressHint::NONE,
                false,
            )
        }
        REQUEST_AVR_ERROR => send_error_packet(micro, ERROR_CODE_PROTOCOL, "As requested"),
        _ => send_error_packet(micro, ERROR_CODE_PROTOCOL, "Bad REQUEST_AVR payload"),
    }
}
