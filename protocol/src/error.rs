//! Transfer error taxonomy.
//!
//! Every fallible operation in the crate returns one of these kinds.
//! Transport errors are never retried automatically (the intentionally
//! unbounded handshake wait is the one exception, and it reports
//! [`Error::HandshakeFailure`] instead of failing); they unwind to the
//! session layer, which logs, optionally stalls an endpoint direction,
//! and restarts from idle on the next iteration.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can end a transfer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The microcomputer did not complete its side of a byte handshake
    /// promptly. The byte still went through; the kind signals a
    /// degraded link to the caller.
    #[error("remote did not complete the byte handshake in time")]
    HandshakeFailure,

    /// The microcomputer is restarting. Reinterpreted from
    /// [`Error::HandshakeFailure`] when it surfaces during request
    /// header receipt; aborts the iteration silently.
    #[error("remote device initiated a reset")]
    RemoteReset,

    /// The host stalled the bulk endpoint.
    #[error("USB endpoint stalled")]
    EndpointStalled,

    /// The device was disconnected from the bus.
    #[error("USB device disconnected")]
    DeviceDisconnected,

    /// The bus was suspended mid-transfer.
    #[error("USB bus suspended")]
    BusSuspended,

    /// The endpoint did not become ready in time.
    #[error("USB transfer timed out")]
    Timeout,

    /// Any other fault reported by the USB device core.
    #[error("unspecified USB fault")]
    Usb,
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::HandshakeFailure => embedded_io::ErrorKind::Other,
            Error::RemoteReset => embedded_io::ErrorKind::ConnectionReset,
            Error::EndpointStalled => embedded_io::ErrorKind::BrokenPipe,
            Error::DeviceDisconnected => embedded_io::ErrorKind::NotConnected,
            Error::BusSuspended => embedded_io::ErrorKind::Interrupted,
            Error::Timeout => embedded_io::ErrorKind::TimedOut,
            Error::Usb => embedded_io::ErrorKind::Other,
        }
    }
}
