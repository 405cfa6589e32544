//! Register map of the MegaInd board
//!
//! Addresses are fixed by the board firmware.

/// 7-bit I2C slave address of the board
pub const DEVICE_ADDRESS: u16 = 0x50;

/// Digital inputs, one byte, active-low, bits 0..=3 used
pub const DIGITAL_INPUT: u8 = 0x03;

/// Analog input feeding the Up soft button, 16-bit little-endian
pub const ANALOG_INPUT_UP: u8 = 0x1C;

/// Analog input feeding the Down soft button, 16-bit little-endian
pub const ANALOG_INPUT_DOWN: u8 = 0x1E;

/// Fan PWM duty, one byte
pub const FAN_PWM: u8 = 0x14;

/// Lamp PWM duty registers, indexed by lamp
pub const LAMP_PWM: [u8; LAMP_COUNT] = [0x16, 0x18];

/// Number of lamps wired to the board
pub const LAMP_COUNT: usize = 2;

/// Used bits of the digital input register
pub const DIGITAL_MASK: u8 = 0x0F;
