//! Lamp and fan outputs
//!
//! Plain writes (`set_lamp`, `set_fan_speed`) are one register transaction.
//! Flashing runs one toggler task per lamp:
//!
//! ```text
//! start_flashing(i) ──► [cancel + join old toggler i] ──► spawn toggler i
//!                                                        │  every interval:
//!                                                        │  write on / 0
//! stop_flashing(i) ───► cancel + join toggler i ──► write 0
//! ```
//!
//! Each toggler owns a child of the controller-wide shutdown token, so
//! cancelling the parent stops them all.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{ControllerError, ValidationError};
use crate::bus::registers::{FAN_PWM, LAMP_COUNT, LAMP_PWM};
use crate::bus::RegisterDevice;

/// Highest accepted brightness / fan percentage
pub const MAX_LEVEL: u8 = 100;

/// Longest accepted flash interval
pub const MAX_FLASH_INTERVAL: Duration = Duration::from_secs(3600);

/// How a 0..=100 percentage becomes a PWM register value
///
/// The board's calibration is unknown, so the raw percentage is written by
/// default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PwmScaling {
    #[default]
    Percent,
    /// Rescale to the full 8-bit duty range, rounded
    FullRange,
}

impl PwmScaling {
    pub fn register_value(self, percent: u8) -> u8 {
        match self {
            PwmScaling::Percent => percent,
            PwmScaling::FullRange => {
                let scaled = (u16::from(percent.min(MAX_LEVEL)) * 255 + 50) / 100;
                scaled as u8
            }
        }
    }
}

struct Flasher {
    token: CancellationToken,
    handle: JoinHandle<()>,
    brightness: u8,
    interval: Duration,
}

impl Flasher {
    async fn stop(self, index: usize) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("Flasher for lamp {} ended abnormally: {}", index, e);
        }
    }
}

pub struct ActuatorController {
    device: RegisterDevice,
    scaling: PwmScaling,
    shutdown: CancellationToken,
    flashers: Mutex<[Option<Flasher>; LAMP_COUNT]>,
}

impl ActuatorController {
    pub fn new(device: RegisterDevice, scaling: PwmScaling, shutdown: CancellationToken) -> Self {
        Self {
            device,
            scaling,
            shutdown,
            flashers: Mutex::new(std::array::from_fn(|_| None)),
        }
    }

    fn check_index(index: usize) -> Result<(), ValidationError> {
        if index >= LAMP_COUNT {
            return Err(ValidationError::LampIndex {
                index,
                lamp_count: LAMP_COUNT,
            });
        }
        Ok(())
    }

    fn check_brightness(brightness: u8) -> Result<(), ValidationError> {
        if brightness > MAX_LEVEL {
            return Err(ValidationError::Brightness(brightness));
        }
        Ok(())
    }

    async fn write_lamp(&self, index: usize, brightness: u8) -> Result<(), ControllerError> {
        self.device
            .write_byte(LAMP_PWM[index], self.scaling.register_value(brightness))
            .await?;
        Ok(())
    }

    pub async fn set_lamp(&self, index: usize, brightness: u8) -> Result<(), ControllerError> {
        Self::check_index(index)?;
        Self::check_brightness(brightness)?;
        self.write_lamp(index, brightness).await?;
        info!("Lamp {} brightness set to: {}", index, brightness);
        Ok(())
    }

    /// Starts toggling lamp `index` between `brightness` and 0
    ///
    /// A toggler already running on this lamp is stopped and joined first, so
    /// at most one task ever writes a given lamp.
    pub async fn start_flashing(
        &self,
        index: usize,
        brightness: u8,
        interval: Duration,
    ) -> Result<(), ControllerError> {
        Self::check_index(index)?;
        Self::check_brightness(brightness)?;
        if interval.is_zero() {
            return Err(ValidationError::ZeroInterval.into());
        }
        if interval > MAX_FLASH_INTERVAL {
            return Err(ValidationError::IntervalTooLong {
                interval,
                max: MAX_FLASH_INTERVAL,
            }
            .into());
        }

        let mut flashers = self.flashers.lock().await;
        if let Some(previous) = flashers[index].take() {
            debug!(
                "Replacing flasher on lamp {} (was {} every {:?})",
                index, previous.brightness, previous.interval
            );
            previous.stop(index).await;
        }

        let token = self.shutdown.child_token();
        let handle = tokio::spawn(run_flasher(
            self.device.clone(),
            LAMP_PWM[index],
            self.scaling.register_value(brightness),
            interval,
            token.clone(),
        ));
        flashers[index] = Some(Flasher {
            token,
            handle,
            brightness,
            interval,
        });

        info!(
            "Started flashing lamp {} with brightness {} and interval {:?}",
            index, brightness, interval
        );
        Ok(())
    }

    /// Stops the toggler on lamp `index` and forces the lamp dark
    ///
    /// The toggler is joined before the final write, so nothing it does can
    /// land after the lamp has been switched off.
    pub async fn stop_flashing(&self, index: usize) -> Result<(), ControllerError> {
        Self::check_index(index)?;

        let previous = self.flashers.lock().await[index].take();
        if let Some(flasher) = previous {
            flasher.stop(index).await;
        }
        self.write_lamp(index, 0).await?;

        info!("Stopped flashing lamp {}", index);
        Ok(())
    }

    pub async fn is_flashing(&self, index: usize) -> bool {
        match self.flashers.lock().await.get(index) {
            Some(Some(flasher)) => !flasher.handle.is_finished(),
            _ => false,
        }
    }

    /// Cancels and joins every toggler, leaving lamps as they are
    pub async fn stop_all(&self) {
        let mut flashers = self.flashers.lock().await;
        for (index, slot) in flashers.iter_mut().enumerate() {
            if let Some(flasher) = slot.take() {
                flasher.stop(index).await;
            }
        }
    }

    pub async fn set_fan_speed(&self, percent: u8) -> Result<(), ControllerError> {
        if percent > MAX_LEVEL {
            return Err(ValidationError::FanSpeed(percent).into());
        }
        self.device
            .write_byte(FAN_PWM, self.scaling.register_value(percent))
            .await?;
        info!("Fan speed set to: {}", percent);
        Ok(())
    }
}

async fn run_flasher(
    device: RegisterDevice,
    register: u8,
    on_value: u8,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = match Instant::now().checked_add(period) {
        Some(start) => interval_at(start, period),
        None => {
            let mut ticker = interval(period);
            ticker.tick().await;
            ticker
        }
    };
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lit = false;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                lit = !lit;
                let value = if lit { on_value } else { 0 };
                if let Err(e) = device.write_byte(register, value).await {
                    warn!("Flash write failed: {}", e);
                }
            }
        }
    }
    debug!("Flasher on register {:#04x} stopped", register);
}
