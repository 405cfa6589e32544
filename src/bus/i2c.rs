//! Raspberry Pi I2C transport

use rppal::i2c::I2c;
use tracing::{debug, error, info};

use super::{BusConnector, BusError, BusTransport, TransportError};

/// [`BusTransport`] over `/dev/i2c-N` via rppal
pub struct I2cTransport {
    i2c: I2c,
}

impl I2cTransport {
    pub fn open(bus_id: u8, address: u16) -> Result<Self, TransportError> {
        let mut i2c = I2c::with_bus(bus_id)?;
        i2c.set_slave_address(address)?;
        debug!(
            "Opened I2C bus {} at {} Hz, slave {:#04x}",
            bus_id,
            i2c.clock_speed().unwrap_or_default(),
            address
        );
        Ok(Self { i2c })
    }
}

impl BusTransport for I2cTransport {
    fn write_read(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), TransportError> {
        self.i2c.write_read(write, read)?;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let written = self.i2c.write(bytes)?;
        if written != bytes.len() {
            return Err(TransportError::ShortWrite {
                expected: bytes.len(),
                written,
            });
        }
        Ok(())
    }
}

/// Opens [`I2cTransport`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct I2cConnector;

impl BusConnector for I2cConnector {
    fn open(&self, bus_id: u8, address: u16) -> Result<Box<dyn BusTransport>, BusError> {
        info!("Opening I2C bus {} for slave {:#04x}", bus_id, address);
        match I2cTransport::open(bus_id, address) {
            Ok(transport) => Ok(Box::new(transport)),
            Err(source) => {
                error!("Failed to open I2C bus {}: {}", bus_id, source);
                Err(BusError::Open { bus_id, source })
            }
        }
    }
}
