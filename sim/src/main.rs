//! # Bridge Simulator
//!
//! Runs the protocol session against in-memory stand-ins for both links:
//! a scripted microcomputer on one side and a loopback storage server on
//! the other. Useful for watching the forwarding engine and session
//! machine at work from a desktop, with the full diagnostic output the
//! firmware would produce.
//!
//! ```text
//! ScriptedMicro ──► Session ──► EchoServer
//!       ▲              │            │
//!       └──────────────┴────────────┘
//! ```
//!
//! Run with `RUST_LOG=trace` for byte-level relay tracing.

use std::collections::VecDeque;

use log::{debug, info, warn};

use bridge_protocol::{
    codes, ByteTransport, HeaderDecoder, HostLink, Lamps, MicroLink, PacketHeader, Result, Session,
    StatusIndicator, Step,
};

/// Microcomputer stand-in: replays a canned byte stream of requests and
/// keeps everything sent back to it.
#[derive(Default)]
struct ScriptedMicro {
    script: VecDeque<u8>,
    responses: Vec<u8>,
}

impl ScriptedMicro {
    fn queue_packet(&mut self, header: PacketHeader, payload: &[u8]) {
        self.script.extend(header.encode());
        self.script.extend(payload);
    }

    fn queue_probe(&mut self) {
        self.script.push_back(codes::REQUEST_AVR_PRESENCE);
    }
}

impl ByteTransport for ScriptedMicro {
    fn receive_byte(&mut self) -> Result<u8> {
        // The script always covers the whole run; an empty queue would be
        // a bug in main, not a link condition.
        Ok(self.script.pop_front().unwrap_or_default())
    }

    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.responses.push(byte);
        Ok(())
    }
}

impl MicroLink for ScriptedMicro {}

/// Host stand-in: accumulates the forwarded request and, once it has been
/// flushed across, answers with the request payload echoed back as data.
#[derive(Default)]
struct EchoServer {
    request: Vec<u8>,
    pending: VecDeque<u8>,
}

impl EchoServer {
    fn build_response(&mut self) {
        let mut decoder = HeaderDecoder::new();
        let mut bytes = self.request.drain(..);
        let header = loop {
            match bytes.next().map(|b| decoder.push(b)) {
                Some(Step::Complete(header)) => break header,
                Some(Step::NeedMore) => continue,
                None => return,
            }
        };
        let payload: Vec<u8> = bytes.collect();
        info!(
            "server: request {:02X}, {} payload bytes",
            header.code(),
            payload.len()
        );

        let response = PacketHeader::variable(codes::RESPONSE_DATA, payload.len() as u32);
        self.pending.extend(response.encode());
        self.pending.extend(payload);
    }
}

impl ByteTransport for EchoServer {
    fn receive_byte(&mut self) -> Result<u8> {
        Ok(self.pending.pop_front().unwrap_or_default())
    }

    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.request.push(byte);
        Ok(())
    }
}

impl HostLink for EchoServer {
    fn flush_partial(&mut self) {
        self.build_response();
    }

    fn stall_device_to_host(&mut self) {
        warn!("server: device→host stalled");
    }

    fn stall_host_to_device(&mut self) {
        warn!("server: host→device stalled");
    }
}

/// Lamp driver that narrates state changes instead of toggling pins.
#[derive(Default)]
struct ConsoleLamps;

impl StatusIndicator for ConsoleLamps {
    fn set(&mut self, lamps: Lamps) {
        debug!(
            "lamps: micro {} host {}",
            if lamps.micro { "on" } else { "off" },
            if lamps.host { "on" } else { "off" }
        );
    }
}

/// Decode and narrate everything the microcomputer received.
fn dump_responses(bytes: &[u8]) {
    let mut decoder = HeaderDecoder::new();
    let mut remaining = 0u32;
    for &byte in bytes {
        if remaining > 0 {
            remaining -= 1;
            continue;
        }
        if let Step::Complete(header) = decoder.push(byte) {
            info!("micro: response {:02X} {:?}", header.code(), header.payload());
            remaining = header.payload_size().unwrap_or(0);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("bridge-sim, protocol version {}", codes::PROTOCOL_VERSION);

    let mut micro = ScriptedMicro::default();

    // A plausible boot conversation: the ROM probes for the bridge, asks
    // whether it is ready, then starts issuing storage requests.
    micro.queue_probe();
    micro.queue_packet(
        PacketHeader::fixed(codes::REQUEST_AVR, codes::REQUEST_AVR_READY),
        &[],
    );
    micro.queue_packet(
        PacketHeader::variable(codes::REQUEST_FILE_OP, 5),
        b"HELLO",
    );
    micro.queue_packet(PacketHeader::fixed(codes::REQUEST_BYTE_GET, 0), &[]);
    micro.queue_packet(
        PacketHeader::fixed(codes::REQUEST_AVR, codes::REQUEST_AVR_ERROR),
        &[],
    );

    let exchanges = 5;
    let mut session = Session::new(micro, EchoServer::default(), ConsoleLamps);

    for i in 0..exchanges {
        let outcome = session.run_iteration();
        info!("iteration {}: {:?}", i, outcome);
    }

    dump_responses(&session.micro_mut().responses.clone());
}
