//! Input sampler
//!
//! Polls the input registers once per tick, decodes them into [`ButtonState`]
//! and publishes a snapshot to the [`SnapshotQueue`].
//!
//! ```text
//! tick ──► DIGITAL_INPUT ──► A/B/X/Y ──┐
//!      ──► ANALOG_INPUT_UP/DOWN ──► Up/Down ──► ButtonState ──► SnapshotQueue
//! ```
//!
//! A failed read skips the rest of the tick; the loop only ends on
//! cancellation, checked between ticks.

use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::button_state::{ButtonSnapshot, ButtonState, LogicalButton};
use super::snapshot_queue::SnapshotQueue;
use crate::bus::registers::{ANALOG_INPUT_DOWN, ANALOG_INPUT_UP, DIGITAL_INPUT, DIGITAL_MASK};
use crate::bus::{BusError, RegisterDevice};

/// Open interval of raw analog readings that count as "pressed"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalogThresholdWindow {
    pub lower: f64,
    pub upper: f64,
}

impl Default for AnalogThresholdWindow {
    // Voltage band of a 5V button on the analog inputs
    fn default() -> Self {
        Self {
            lower: 114.75,
            upper: 140.25,
        }
    }
}

impl AnalogThresholdWindow {
    /// `lower < sample < upper`, both bounds excluded
    pub fn contains(&self, sample: f64) -> bool {
        sample > self.lower && sample < self.upper
    }

    pub fn is_valid(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower < self.upper
    }
}

/// Decodes the active-low digital input register into A, B, X, Y
pub fn decode_digital(raw: u8) -> [(LogicalButton, bool); 4] {
    let active = !raw & DIGITAL_MASK;
    [
        (LogicalButton::A, active & 0b0001 != 0),
        (LogicalButton::B, active & 0b0010 != 0),
        (LogicalButton::X, active & 0b0100 != 0),
        (LogicalButton::Y, active & 0b1000 != 0),
    ]
}

#[derive(Clone, Debug)]
pub struct SamplerSettings {
    pub poll_interval: Duration,
    pub analog_window: AnalogThresholdWindow,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            analog_window: AnalogThresholdWindow::default(),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SamplerState {
    Initializing,
    Sampling,
}

#[machine]
pub struct Sampler<S: SamplerState> {
    device: RegisterDevice,
    buttons: ButtonState,
    queue: Arc<SnapshotQueue>,
    settings: SamplerSettings,
    // Consecutive failed ticks, reset on the first good one
    failed_ticks: u32,
}

impl Sampler<Initializing> {
    pub fn create(
        device: RegisterDevice,
        buttons: ButtonState,
        queue: Arc<SnapshotQueue>,
        settings: SamplerSettings,
    ) -> Self {
        debug!("Creating sampler with settings: {:?}", settings);
        Self::new(device, buttons, queue, settings, 0)
    }

    pub fn start(self) -> Sampler<Sampling> {
        info!(
            "Sampler starting, polling every {:?}",
            self.settings.poll_interval
        );
        self.transition()
    }
}

impl Sampler<Sampling> {
    /// Reads and decodes all inputs once
    ///
    /// Digital buttons are updated before the analog reads, so a failing
    /// analog channel still lets A/B/X/Y through for this tick.
    pub async fn sample_once(&mut self) -> Result<ButtonSnapshot, BusError> {
        let raw = self.device.read_byte(DIGITAL_INPUT).await?;
        self.buttons.set_all(&decode_digital(raw));

        let up = self.device.read_word(ANALOG_INPUT_UP).await?;
        let down = self.device.read_word(ANALOG_INPUT_DOWN).await?;
        let window = self.settings.analog_window;
        self.buttons.set_all(&[
            (LogicalButton::Up, window.contains(f64::from(up))),
            (LogicalButton::Down, window.contains(f64::from(down))),
        ]);

        Ok(self.buttons.snapshot())
    }

    async fn tick(&mut self) {
        match self.sample_once().await {
            Ok(snapshot) => {
                if self.failed_ticks > 0 {
                    info!("Input reads recovered after {} failed ticks", self.failed_ticks);
                    self.failed_ticks = 0;
                }
                let delivered = self.queue.publish(&snapshot);
                debug!(
                    "Sampled {:?}, delivered to {} subscribers",
                    snapshot.pressed().collect::<Vec<_>>(),
                    delivered
                );
            }
            Err(e) => {
                if self.failed_ticks == 0 {
                    error!("Error polling inputs: {}", e);
                } else {
                    debug!("Error polling inputs (tick {}): {}", self.failed_ticks + 1, e);
                }
                self.failed_ticks = self.failed_ticks.saturating_add(1);
            }
        }
    }

    /// Polls until `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        info!("Sampler stopped");
    }
}
