//! The forwarding engine.
//!
//! Every request/response leg goes through [`forward_packet`]: send the
//! response header on the sink, then relay the declared number of payload
//! bytes from the source, one at a time. There is no buffering anywhere:
//! each byte is received and immediately forwarded before the next is
//! requested, so memory use is O(1) no matter how large the payload
//! claims to be (and it may claim up to 2^32-1 bytes).
//!
//! One function serves both directions; the source, sink and progress
//! hint decide which way the bytes flow and which lamp flickers.

use log::{debug, trace};

use crate::codes;
use crate::error::Result;
use crate::header::{PacketHeader, Payload};
use crate::source::PayloadSource;
use crate::status::{Lamps, StatusIndicator};
use crate::transport::ByteTransport;

/// Payloads longer than this only get byte-level tracing for their first
/// and last `DUMP_WINDOW / 2` bytes; the middle is summarized once.
pub const DUMP_WINDOW: u32 = 50;

/// Bit of the loop counter driving the lamp heartbeat. Toggles a handful
/// of times per second at user-port byte rates.
const HEARTBEAT_BIT: u32 = 1 << 12;

/// Lamp states for a forwarding leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgressHint {
    /// Held on for the whole transfer.
    pub steady: Lamps,
    /// Overlaid on the heartbeat half-cycles.
    pub flicker: Lamps,
}

impl ProgressHint {
    /// No lamp updates at all; used for locally dispatched responses.
    pub const NONE: ProgressHint = ProgressHint {
        steady: Lamps::OFF,
        flicker: Lamps::OFF,
    };

    fn is_none(&self) -> bool {
        self.steady.is_off() && self.flicker.is_off()
    }
}

/// Whether this leg is worth byte-level tracing. The request header is
/// diagnostics context only; synthesized responses pass `None` and stay
/// quiet.
fn wants_trace(request: Option<&PacketHeader>) -> bool {
    match request {
        Some(header) => !codes::is_quiet(header.code()),
        None => false,
    }
}

/// Send `response`'s header via `sink`, then relay its payload from
/// `source`, byte for byte.
///
/// On any transport error the relay stops immediately (bytes already
/// forwarded stay forwarded, nothing is skipped or substituted) and the
/// error propagates to the session.
pub fn forward_packet<S, T, P>(
    request: Option<&PacketHeader>,
    response: &PacketHeader,
    sink: &mut S,
    mut source: PayloadSource<'_, T>,
    mut indicator: P,
    hint: ProgressHint,
    verbose: bool,
) -> Result<()>
where
    S: ByteTransport + ?Sized,
    T: ByteTransport,
    P: StatusIndicator,
{
    sink.send_byte(response.type_byte())?;

    let size = match response.payload() {
        Payload::Inline(value) => {
            // The inline byte is the whole payload; no loop runs and the
            // source is never consulted.
            sink.send_byte(value)?;
            return Ok(());
        }
        Payload::Size(size) => {
            for byte in size.to_le_bytes() {
                sink.send_byte(byte)?;
            }
            size
        }
    };

    let initially_tracing = verbose && wants_trace(request);
    let mut tracing = initially_tracing;
    if tracing {
        debug!("forwarding payload, {} bytes", size);
    }

    let mut last_lamps: Option<Lamps> = None;

    for i in 0..size {
        // The middle of a long transfer is rarely interesting.
        if size > DUMP_WINDOW {
            if i == DUMP_WINDOW / 2 {
                if tracing {
                    debug!("(eliding transfer)");
                }
                tracing = false;
            } else if i == size - DUMP_WINDOW / 2 {
                tracing = initially_tracing;
            }
        }

        if !hint.is_none() {
            let lamps = if i & HEARTBEAT_BIT != 0 {
                hint.steady.union(hint.flicker)
            } else {
                hint.steady
            };
            if last_lamps != Some(lamps) {
                indicator.set(lamps);
                last_lamps = Some(lamps);
            }
        }

        let byte = source.next_byte()?;

        if tracing {
            let shown = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '.'
            };
            trace!("{}/{}: {:02X} '{}'", i, size, byte, shown);
        }

        sink.send_byte(byte)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::source::{ErrorPayload, NoTransport};
    use crate::status::NullIndicator;
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[derive(Default)]
    struct MockLink {
        incoming: VecDeque<u8>,
        outgoing: Vec<u8>,
        fail_receive_at: Option<usize>,
        received: usize,
        fail_send_at: Option<usize>,
    }

    impl MockLink {
        fn with_incoming(data: impl IntoIterator<Item = u8>) -> Self {
            Self {
                incoming: data.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    impl ByteTransport for MockLink {
        fn receive_byte(&mut self) -> crate::Result<u8> {
            if self.fail_receive_at == Some(self.received) {
                return Err(Error::Timeout);
            }
            self.received += 1;
            Ok(self.incoming.pop_front().expect("source exhausted"))
        }

        fn send_byte(&mut self, byte: u8) -> crate::Result<()> {
            if self.fail_send_at == Some(self.outgoing.len()) {
                return Err(Error::EndpointStalled);
            }
            self.outgoing.push(byte);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingIndicator {
        states: Vec<Lamps>,
    }

    impl StatusIndicator for RecordingIndicator {
        fn set(&mut self, lamps: Lamps) {
            self.states.push(lamps);
        }
    }

    fn payload(n: u32) -> Vec<u8> {
        (0..n).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_fixed_size_sends_header_only() {
        let mut sink = MockLink::default();
        let header = PacketHeader::fixed(0x01, 0x2A);
        forward_packet(
            None,
            &header,
            &mut sink,
            PayloadSource::<NoTransport>::Empty,
            NullIndicator,
            ProgressHint::NONE,
            true,
        )
        .unwrap();
        assert_eq!(sink.outgoing, [0x01, 0x2A]);
    }

    #[test]
    fn test_relay_preserves_order_for_large_payloads() {
        let data = payload(10_000);
        let mut source = MockLink::with_incoming(data.iter().copied());
        let mut sink = MockLink::default();
        let header = PacketHeader::variable(0x03, data.len() as u32);

        forward_packet(
            None,
            &header,
            &mut sink,
            PayloadSource::Transport(&mut source),
            NullIndicator,
            ProgressHint::NONE,
            false,
        )
        .unwrap();

        assert_eq!(&sink.outgoing[..5], header.encode().as_slice());
        assert_eq!(&sink.outgoing[5..], data.as_slice());
    }

    #[test]
    fn test_receive_error_aborts_after_relaying_prefix() {
        let data = payload(100);
        let mut source = MockLink::with_incoming(data.iter().copied());
        source.fail_receive_at = Some(37);
        let mut sink = MockLink::default();
        let header = PacketHeader::variable(0x03, 100);

        let result = forward_packet(
            None,
            &header,
            &mut sink,
            PayloadSource::Transport(&mut source),
            NullIndicator,
            ProgressHint::NONE,
            false,
        );

        assert_eq!(result, Err(Error::Timeout));
        // Header plus exactly the 37 bytes that went through before the
        // fault; nothing skipped, nothing substituted.
        assert_eq!(sink.outgoing.len(), 5 + 37);
        assert_eq!(&sink.outgoing[5..], &data[..37]);
    }

    #[test]
    fn test_send_error_aborts_immediately() {
        let data = payload(20);
        let mut source = MockLink::with_incoming(data.iter().copied());
        let mut sink = MockLink::default();
        sink.fail_send_at = Some(5 + 11);
        let header = PacketHeader::variable(0x03, 20);

        let result = forward_packet(
            None,
            &header,
            &mut sink,
            PayloadSource::Transport(&mut source),
            NullIndicator,
            ProgressHint::NONE,
            false,
        );

        assert_eq!(result, Err(Error::EndpointStalled));
        assert_eq!(sink.outgoing.len(), 5 + 11);
    }

    #[test]
    fn test_elision_does_not_alter_the_relay() {
        // Longer than DUMP_WINDOW so the middle is elided from tracing;
        // every byte must still be relayed.
        let data = payload(200);
        let mut source = MockLink::with_incoming(data.iter().copied());
        let mut sink = MockLink::default();
        let request = PacketHeader::fixed(0x40, 0);
        let header = PacketHeader::variable(0x03, 200);

        forward_packet(
            Some(&request),
            &header,
            &mut sink,
            PayloadSource::Transport(&mut source),
            NullIndicator,
            ProgressHint::NONE,
            true,
        )
        .unwrap();

        assert_eq!(&sink.outgoing[5..], data.as_slice());
    }

    #[test]
    fn test_synthesized_payload_is_relayed() {
        let mut sink = MockLink::default();
        let payload = ErrorPayload::new(255, "As requested");
        let header = PacketHeader::variable(crate::codes::RESPONSE_ERROR, payload.wire_size());

        forward_packet(
            None,
            &header,
            &mut sink,
            PayloadSource::<NoTransport>::Synthesized(payload),
            NullIndicator,
            ProgressHint::NONE,
            false,
        )
        .unwrap();

        let mut expected: Vec<u8> = header.encode().to_vec();
        expected.extend_from_slice(&[0x00, 255]);
        expected.extend_from_slice(b"As requested\0");
        assert_eq!(sink.outgoing, expected);
    }

    #[test]
    fn test_indicator_updates_only_on_state_changes() {
        let data = payload(10_000);
        let mut source = MockLink::with_incoming(data.iter().copied());
        let mut sink = MockLink::default();
        let header = PacketHeader::variable(0x03, data.len() as u32);
        let mut indicator = RecordingIndicator::default();
        let hint = ProgressHint {
            steady: Lamps::MICRO,
            flicker: Lamps::HOST,
        };

        forward_packet(
            None,
            &header,
            &mut sink,
            PayloadSource::Transport(&mut source),
            &mut indicator,
            hint,
            false,
        )
        .unwrap();

        // Heartbeat bit flips at 4096 and 8192: three distinct states,
        // three writes, no redundant ones in between.
        assert_eq!(
            indicator.states,
            [Lamps::MICRO, Lamps::IDLE, Lamps::MICRO]
        );
    }

    #[test]
    fn test_no_lamp_writes_without_a_hint() {
        let data = payload(64);
        let mut source = MockLink::with_incoming(data.iter().copied());
        let mut sink = MockLink::default();
        let header = PacketHeader::variable(0x03, 64);
        let mut indicator = RecordingIndicator::default();

        forward_packet(
            None,
            &header,
            &mut sink,
            PayloadSource::Transport(&mut source),
            &mut indicator,
            ProgressHint::NONE,
            false,
        )
        .unwrap();

        assert!(indicator.states.is_empty());
    }
}
