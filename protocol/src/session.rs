//! The request/response session machine.
//!
//! One iteration serves exactly one exchange: wait for a request header
//! from the microcomputer, answer it locally or relay it to the PC, then
//! relay the PC's response back. The machine holds no transfer state
//! across iterations beyond the last request code (used to decide whether
//! the next "waiting" notice is worth printing), so any failure simply
//! ends the iteration and the next one starts from idle.
//!
//! Error policy: a fault while receiving or forwarding the request stalls
//! the device→host direction, so the PC sees its read fail instead of
//! blocking on a packet that will never complete. A fault on the response
//! side stalls host→device for the same reason in reverse. A handshake
//! failure on the very first request byte is not a fault at all, just
//! how a restarting microcomputer announces itself, and aborts the
//! iteration quietly.

use log::{debug, error, info};

use crate::codes;
use crate::dispatch;
use crate::error::{Error, Result};
use crate::forward::{forward_packet, ProgressHint};
use crate::header::{code_of_type_byte, HeaderDecoder, PacketHeader, Step};
use crate::source::PayloadSource;
use crate::status::{Lamps, StatusIndicator};
use crate::transport::{HostLink, MicroLink};

/// What one session iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Bare presence probe, accepted silently.
    Probe,
    /// Meta-request answered by the bridge itself.
    Local,
    /// Request and response relayed end to end.
    Forwarded,
    /// The microcomputer restarted mid-header.
    RemoteReset,
    /// The request leg failed; device→host was stalled.
    RequestFailed(Error),
    /// The response leg failed; host→device was stalled.
    ResponseFailed(Error),
}

/// The bridge session: one microcomputer link, one host link, two lamps.
pub struct Session<M, H, P> {
    micro: M,
    host: H,
    indicator: P,
    last_request_code: Option<u8>,
    verbose: bool,
}

impl<M, H, P> Session<M, H, P>
where
    M: MicroLink,
    H: HostLink,
    P: StatusIndicator,
{
    pub fn new(micro: M, host: H, indicator: P) -> Self {
        Self {
            micro,
            host,
            indicator,
            last_request_code: None,
            verbose: true,
        }
    }

    /// Toggle byte-level diagnostics. Wired to the host's vendor control
    /// request by board code.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Access the microcomputer link, for board-level housekeeping.
    pub fn micro_mut(&mut self) -> &mut M {
        &mut self.micro
    }

    /// Access the host link.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Serve one request/response exchange.
    pub fn run_iteration(&mut self) -> Outcome {
        self.indicator.set(Lamps::IDLE);

        // After a burst-prone request the notice would just repeat
        // thousands of times, so stay quiet until something chattier
        // comes along.
        let announce =
            self.verbose && self.last_request_code.map_or(true, |c| !codes::is_quiet(c));
        if announce {
            info!("waiting for request");
        }

        self.micro.begin_header_wait(announce);
        let request = self.receive_request_header();
        self.micro.end_header_wait();

        let request = match request {
            Ok(Some(header)) => header,
            Ok(None) => {
                debug!("presence probe");
                return Outcome::Probe;
            }
            Err(Error::RemoteReset) => {
                info!("remote reset");
                return Outcome::RemoteReset;
            }
            Err(err) => {
                error!("receiving request header: {}", err);
                self.host.stall_device_to_host();
                return Outcome::RequestFailed(err);
            }
        };

        self.last_request_code = Some(request.code());

        if request.code() == codes::REQUEST_AVR {
            return match dispatch::handle_meta_request(&request, &mut self.micro) {
                Ok(()) => Outcome::Local,
                Err(err) => {
                    // The reply went back towards the microcomputer, so
                    // there is nothing host-side to stall.
                    error!("answering meta-request: {}", err);
                    Outcome::RequestFailed(err)
                }
            };
        }

        let hint = ProgressHint {
            steady: Lamps::MICRO,
            flicker: Lamps::HOST,
        };
        if let Err(err) = forward_packet(
            Some(&request),
            &request,
            &mut self.host,
            PayloadSource::Transport(&mut self.micro),
            &mut self.indicator,
            hint,
            self.verbose,
        ) {
            error!("forwarding request {:02X}: {}", request.code(), err);
            self.host.stall_device_to_host();
            return Outcome::RequestFailed(err);
        }

        // The request may not fill the last bulk packet exactly; push the
        // remainder out so the server sees the whole thing now.
        self.host.flush_partial();

        self.indicator.set(Lamps::HOST);
        let response = match self.receive_response_header() {
            Ok(header) => header,
            Err(err) => {
                error!("receiving response header: {}", err);
                self.host.stall_host_to_device();
                return Outcome::ResponseFailed(err);
            }
        };

        let hint = ProgressHint {
            steady: Lamps::HOST,
            flicker: Lamps::MICRO,
        };
        if let Err(err) = forward_packet(
            Some(&request),
            &response,
            &mut self.micro,
            PayloadSource::Transport(&mut self.host),
            &mut self.indicator,
            hint,
            self.verbose,
        ) {
            error!("forwarding response {:02X}: {}", response.code(), err);
            self.host.stall_host_to_device();
            return Outcome::ResponseFailed(err);
        }

        Outcome::Forwarded
    }

    /// Receive a request header from the microcomputer. `Ok(None)` is a
    /// presence probe, which consists of the type byte alone.
    fn receive_request_header(&mut self) -> Result<Option<PacketHeader>> {
        // Only the first byte: a handshake failure here means the remote
        // is coming out of reset, not that an exchange broke.
        let first = self.micro.receive_byte().map_err(|err| match err {
            Error::HandshakeFailure => Error::RemoteReset,
            other => other,
        })?;
        self.indicator.set(Lamps::MICRO);

        if code_of_type_byte(first) == codes::REQUEST_AVR_PRESENCE {
            return Ok(None);
        }

        let mut decoder = HeaderDecoder::new();
        let mut step = decoder.push(first);
        loop {
            match step {
                Step::Complete(header) => return Ok(Some(header)),
                Step::NeedMore => step = decoder.push(self.micro.receive_byte()?),
            }
        }
    }

    fn receive_response_header(&mut self) -> Result<PacketHeader> {
        let mut decoder = HeaderDecoder::new();
        loop {
            if let Step::Complete(header) = decoder.push(self.host.receive_byte()?) {
                return Ok(header);
            }
        }
    }
}
