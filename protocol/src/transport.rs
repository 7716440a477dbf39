//! Byte transport abstractions.
//!
//! The forwarding engine and session machine only ever see these traits;
//! the concrete handshake and bulk transports (and the simulator's
//! in-memory fakes) live behind them. Following the usual split: one
//! narrow trait for moving bytes, plus small extension traits for the
//! per-link duties the session needs.

use crate::error::Result;

/// A synchronous, one-byte-at-a-time link.
///
/// Both operations block until the byte has gone through or the link
/// reports a terminal condition. Neither retries on error.
pub trait ByteTransport {
    /// Receive one byte from the remote side.
    fn receive_byte(&mut self) -> Result<u8>;

    /// Send one byte to the remote side.
    fn send_byte(&mut self, byte: u8) -> Result<()>;
}

impl<T: ByteTransport + ?Sized> ByteTransport for &mut T {
    fn receive_byte(&mut self) -> Result<u8> {
        (**self).receive_byte()
    }

    fn send_byte(&mut self, byte: u8) -> Result<()> {
        (**self).send_byte(byte)
    }
}

/// The microcomputer side of the bridge.
///
/// Adds the session-level diagnostic hooks around request-header waits.
/// The defaults are no-ops so test doubles only implement what they need.
pub trait MicroLink: ByteTransport {
    /// Arm the once-per-wait "waiting for request" notice for the
    /// following receives. `already_announced` is true when the session
    /// printed the notice itself before starting the wait.
    fn begin_header_wait(&mut self, already_announced: bool) {
        let _ = already_announced;
    }

    /// Disarm the notice once the request header is in.
    fn end_header_wait(&mut self) {}
}

/// The host side of the bridge, over the USB bulk endpoint pair.
pub trait HostLink: ByteTransport {
    /// Push out a partially filled device→host packet so the host does
    /// not sit on a short final packet.
    fn flush_partial(&mut self);

    /// Stall the device→host direction so the host driver observes the
    /// failure explicitly.
    fn stall_device_to_host(&mut self);

    /// Stall the host→device direction.
    fn stall_host_to_device(&mut self);
}

/// Background I/O-servicing hook.
///
/// The spin-waits in the transports call this on every iteration so USB
/// housekeeping keeps running while the firmware is blocked on the
/// microcomputer or the host. There is no preemption; this is the only
/// way the device core gets serviced during a stall.
pub trait BackgroundTask {
    fn service(&mut self);
}

impl<F: FnMut()> BackgroundTask for F {
    fn service(&mut self) {
        self()
    }
}
