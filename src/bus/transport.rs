use super::{BusError, TransportError};

/// A serial bus bound to one slave address
///
/// Each call is one atomic bus transaction. Implementations are not expected
/// to be reentrant; [`RegisterDevice`](super::RegisterDevice) serializes all
/// access behind one mutex.
pub trait BusTransport: Send {
    /// Writes `write` and then reads `read.len()` bytes in one transaction
    fn write_read(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), TransportError>;

    /// Writes `bytes` in one transaction
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Opens a [`BusTransport`] for a bus id
///
/// Injected into the controller so the hardware bus can be replaced in tests
/// or on other boards.
pub trait BusConnector: Send + Sync {
    fn open(&self, bus_id: u8, address: u16) -> Result<Box<dyn BusTransport>, BusError>;
}
