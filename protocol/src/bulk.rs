//! Bulk transport: the USB host link.
//!
//! Adapts a bulk IN/OUT endpoint pair to the same one-byte interface as
//! the user-port link. The endpoint capabilities mirror the device
//! core's surface: bank full/empty checks, a blocking ready wait that
//! reports terminal conditions, and bank flush/release. Errors here are
//! never retried (a host-side USB fault is not something firmware can
//! wait out), so they propagate to the session, which stalls the
//! affected direction instead.

use crate::error::{Error, Result};
use crate::transport::{ByteTransport, HostLink};

/// Outcome of waiting for an endpoint bank to become ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointStatus {
    Ready,
    Stalled,
    Disconnected,
    Suspended,
    TimedOut,
    Fault,
}

impl EndpointStatus {
    fn into_result(self) -> Result<()> {
        match self {
            EndpointStatus::Ready => Ok(()),
            EndpointStatus::Stalled => Err(Error::EndpointStalled),
            EndpointStatus::Disconnected => Err(Error::DeviceDisconnected),
            EndpointStatus::Suspended => Err(Error::BusSuspended),
            EndpointStatus::TimedOut => Err(Error::Timeout),
            EndpointStatus::Fault => Err(Error::Usb),
        }
    }
}

/// The device→host bulk endpoint.
pub trait BulkIn {
    /// Room left in the current bank?
    fn has_space(&self) -> bool;

    /// Block until a bank is writable or a terminal condition occurs.
    fn wait_ready(&mut self) -> EndpointStatus;

    /// Write one byte into the current bank. Only valid when
    /// [`BulkIn::has_space`] holds.
    fn write_byte(&mut self, byte: u8);

    /// Hand the current bank to the host, even if partially filled.
    fn flush(&mut self);

    /// Bytes written to the current bank but not yet handed over.
    fn pending(&self) -> usize;

    /// Stall the endpoint and abort any pending data.
    fn stall(&mut self);
}

/// The host→device bulk endpoint.
pub trait BulkOut {
    /// Unread bytes left in the current bank?
    fn has_data(&self) -> bool;

    /// Block until the host supplies data or a terminal condition occurs.
    fn wait_ready(&mut self) -> EndpointStatus;

    /// Read one byte from the current bank. Only valid when
    /// [`BulkOut::has_data`] holds.
    fn read_byte(&mut self) -> u8;

    /// Return the drained bank to the controller.
    fn release(&mut self);

    /// Stall the endpoint.
    fn stall(&mut self);
}

/// Byte transport over the endpoint pair.
pub struct BulkTransport<I, O> {
    input: I,
    output: O,
}

impl<I: BulkIn, O: BulkOut> BulkTransport<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self { input, output }
    }
}

impl<I: BulkIn, O: BulkOut> ByteTransport for BulkTransport<I, O> {
    fn receive_byte(&mut self) -> Result<u8> {
        if !self.output.has_data() {
            self.output.wait_ready().into_result()?;
        }
        let value = self.output.read_byte();
        if !self.output.has_data() {
            self.output.release();
        }
        Ok(value)
    }

    fn send_byte(&mut self, byte: u8) -> Result<()> {
        if !self.input.has_space() {
            self.input.flush();
            self.input.wait_ready().into_result()?;
        }
        self.input.write_byte(byte);
        Ok(())
    }
}

impl<I: BulkIn, O: BulkOut> HostLink for BulkTransport<I, O> {
    fn flush_partial(&mut self) {
        if self.input.pending() > 0 {
            self.input.flush();
        }
    }

    fn stall_device_to_host(&mut self) {
        self.input.stall();
    }

    fn stall_host_to_device(&mut self) {
        self.output.stall();
    }
}
