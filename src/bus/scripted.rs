//! In-memory transport for tests
//!
//! Serves reads from a register table and records every transaction.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{BusConnector, BusError, BusTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transaction {
    WriteRead { write: Vec<u8>, read_len: usize },
    Write { bytes: Vec<u8> },
}

#[derive(Default)]
struct ScriptedState {
    registers: HashMap<u8, Vec<u8>>,
    failing_registers: HashSet<u8>,
    fail_writes: bool,
    fail_open: bool,
    opened: usize,
    transactions: Vec<Transaction>,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedBus {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ScriptedState) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub(crate) fn set_bytes(&self, register: u8, bytes: &[u8]) {
        self.with_state(|s| s.registers.insert(register, bytes.to_vec()));
    }

    pub(crate) fn set_word(&self, register: u8, value: u16) {
        self.set_bytes(register, &value.to_le_bytes());
    }

    pub(crate) fn fail_register(&self, register: u8, fail: bool) {
        self.with_state(|s| {
            if fail {
                s.failing_registers.insert(register);
            } else {
                s.failing_registers.remove(&register);
            }
        });
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.with_state(|s| s.fail_writes = fail);
    }

    pub(crate) fn fail_open(&self, fail: bool) {
        self.with_state(|s| s.fail_open = fail);
    }

    pub(crate) fn open_count(&self) -> usize {
        self.with_state(|s| s.opened)
    }

    pub(crate) fn transactions(&self) -> Vec<Transaction> {
        self.with_state(|s| s.transactions.clone())
    }

    /// Values written to `register`, oldest first
    pub(crate) fn writes_to(&self, register: u8) -> Vec<u8> {
        self.with_state(|s| {
            s.transactions
                .iter()
                .filter_map(|t| match t {
                    Transaction::Write { bytes } if bytes.first() == Some(&register) => {
                        bytes.get(1).copied()
                    }
                    _ => None,
                })
                .collect()
        })
    }

    pub(crate) fn write_count(&self) -> usize {
        self.with_state(|s| {
            s.transactions
                .iter()
                .filter(|t| matches!(t, Transaction::Write { .. }))
                .count()
        })
    }

    pub(crate) fn read_count(&self, register: u8) -> usize {
        self.with_state(|s| {
            s.transactions
                .iter()
                .filter(|t| matches!(t, Transaction::WriteRead { write, .. } if write.first() == Some(&register)))
                .count()
        })
    }
}

impl BusTransport for ScriptedBus {
    fn write_read(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), TransportError> {
        self.with_state(|s| {
            s.transactions.push(Transaction::WriteRead {
                write: write.to_vec(),
                read_len: read.len(),
            });
            let register = write.first().copied().unwrap_or_default();
            if s.failing_registers.contains(&register) {
                return Err(TransportError::Other(format!("NACK on {register:#04x}")));
            }
            let stored = s.registers.get(&register).cloned().unwrap_or_default();
            for (i, byte) in read.iter_mut().enumerate() {
                *byte = stored.get(i).copied().unwrap_or(0);
            }
            Ok(())
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.with_state(|s| {
            if s.fail_writes {
                return Err(TransportError::Other("write NACK".to_string()));
            }
            s.transactions.push(Transaction::Write {
                bytes: bytes.to_vec(),
            });
            Ok(())
        })
    }
}

impl BusConnector for ScriptedBus {
    fn open(&self, bus_id: u8, _address: u16) -> Result<Box<dyn BusTransport>, BusError> {
        self.with_state(|s| {
            if s.fail_open {
                return Err(BusError::Open {
                    bus_id,
                    source: TransportError::Other("no such bus".to_string()),
                });
            }
            s.opened += 1;
            Ok(())
        })?;
        Ok(Box::new(self.clone()))
    }
}
