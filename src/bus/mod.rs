//! Register bus access for the MegaInd expansion board
//!
//! Layers, from the wire up:
//!
//! 1. [`transport`] - the narrow [`BusTransport`] trait and the [`BusConnector`]
//!    that opens one for a bus id
//! 2. [`i2c`] - Raspberry Pi I2C implementation on top of `rppal`
//! 3. [`device`] - [`RegisterDevice`], the register protocol (byte/word reads,
//!    byte writes) behind a single bus-access mutex
//! 4. [`registers`] - the fixed register map of the board
//!
//! ```text
//! Sampler ─┐
//!          ├──► RegisterDevice ──(mutex)──► BusTransport ──► I2C
//! Lamps ───┤
//! Fan ─────┘
//! ```

pub mod device;
pub mod i2c;
pub mod registers;
pub mod transport;

#[cfg(test)]
pub(crate) mod scripted;

use std::fmt;

pub use device::RegisterDevice;
pub use i2c::{I2cConnector, I2cTransport};
pub use transport::{BusConnector, BusTransport};

/// Register-level operation, carried in [`BusError::Transaction`] for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOperation {
    ReadByte,
    ReadWord,
    WriteByte,
}

impl fmt::Display for BusOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusOperation::ReadByte => write!(f, "byte read"),
            BusOperation::ReadWord => write!(f, "word read"),
            BusOperation::WriteByte => write!(f, "byte write"),
        }
    }
}

/// Failure of a single transaction on the transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    #[error("Transport error: {0}")]
    Other(String),
}

/// Bus errors as seen by the controller
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The bus could not be opened or the slave address not selected
    #[error("Failed to open bus {bus_id}: {source}")]
    Open {
        bus_id: u8,
        #[source]
        source: TransportError,
    },

    /// A register transaction failed
    #[error("{operation} of register {register:#04x} failed: {source}")]
    Transaction {
        operation: BusOperation,
        register: u8,
        #[source]
        source: TransportError,
    },
}
