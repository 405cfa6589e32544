//! Register protocol over a [`BusTransport`]
//!
//! Every primitive is one transaction: a read writes the register address and
//! reads the value back, a write sends address and value together. Words are
//! little-endian (low byte first).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use super::{BusError, BusOperation, BusTransport};

/// Shared handle to the board's registers
///
/// Clones share one transport. The mutex is held for exactly one transaction,
/// so a sampler read and an actuator write never interleave on the wire.
/// There is no timeout: a hung transport stalls the task inside the
/// transaction and every task queued on the mutex behind it.
#[derive(Clone)]
pub struct RegisterDevice {
    transport: Arc<Mutex<Box<dyn BusTransport>>>,
}

impl RegisterDevice {
    pub fn new(transport: Box<dyn BusTransport>) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
        }
    }

    pub async fn read_byte(&self, register: u8) -> Result<u8, BusError> {
        let mut buffer = [0u8; 1];
        self.transport
            .lock()
            .await
            .write_read(&[register], &mut buffer)
            .map_err(|source| BusError::Transaction {
                operation: BusOperation::ReadByte,
                register,
                source,
            })?;
        trace!("Read {:#04x} from register {:#04x}", buffer[0], register);
        Ok(buffer[0])
    }

    pub async fn read_word(&self, register: u8) -> Result<u16, BusError> {
        let mut buffer = [0u8; 2];
        self.transport
            .lock()
            .await
            .write_read(&[register], &mut buffer)
            .map_err(|source| BusError::Transaction {
                operation: BusOperation::ReadWord,
                register,
                source,
            })?;
        let value = u16::from_le_bytes(buffer);
        trace!("Read {} from register {:#04x}", value, register);
        Ok(value)
    }

    pub async fn write_byte(&self, register: u8, value: u8) -> Result<(), BusError> {
        self.transport
            .lock()
            .await
            .write(&[register, value])
            .map_err(|source| BusError::Transaction {
                operation: BusOperation::WriteByte,
                register,
                source,
            })?;
        trace!("Wrote {} to register {:#04x}", value, register);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::scripted::{ScriptedBus, Transaction};

    #[tokio::test]
    async fn read_byte_addresses_register_and_reads_one_byte() {
        let bus = ScriptedBus::new();
        bus.set_bytes(0x03, &[0xF4]);
        let device = RegisterDevice::new(Box::new(bus.clone()));

        assert_eq!(device.read_byte(0x03).await.unwrap(), 0xF4);
        assert_eq!(
            bus.transactions(),
            vec![Transaction::WriteRead {
                write: vec![0x03],
                read_len: 1
            }]
        );
    }

    #[tokio::test]
    async fn read_word_is_little_endian() {
        let bus = ScriptedBus::new();
        bus.set_bytes(0x1C, &[0x80, 0x00]);
        bus.set_bytes(0x1E, &[0x34, 0x12]);
        let device = RegisterDevice::new(Box::new(bus.clone()));

        assert_eq!(device.read_word(0x1C).await.unwrap(), 128);
        assert_eq!(device.read_word(0x1E).await.unwrap(), 0x1234);
    }

    #[tokio::test]
    async fn write_byte_sends_address_and_value_together() {
        let bus = ScriptedBus::new();
        let device = RegisterDevice::new(Box::new(bus.clone()));

        device.write_byte(0x16, 42).await.unwrap();
        assert_eq!(
            bus.transactions(),
            vec![Transaction::Write {
                bytes: vec![0x16, 42]
            }]
        );
    }

    #[tokio::test]
    async fn failures_carry_register_and_operation() {
        let bus = ScriptedBus::new();
        bus.fail_register(0x1E, true);
        bus.fail_writes(true);
        let device = RegisterDevice::new(Box::new(bus));

        match device.read_word(0x1E).await {
            Err(BusError::Transaction {
                operation: BusOperation::ReadWord,
                register: 0x1E,
                ..
            }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        match device.write_byte(0x14, 10).await {
            Err(BusError::Transaction {
                operation: BusOperation::WriteByte,
                register: 0x14,
                ..
            }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_message_names_register() {
        let bus = ScriptedBus::new();
        bus.fail_register(0x03, true);
        let device = RegisterDevice::new(Box::new(bus));

        let err = device.read_byte(0x03).await.unwrap_err();
        assert!(err.to_string().starts_with("byte read of register 0x03 failed"));
    }
}
