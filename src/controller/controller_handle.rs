//! Controller Handle - Unified API for the MegaInd board
//!
//! Owns the button state, the snapshot queue, and while running the bus, the
//! sampler task and the actuators. Manages the lifecycle:
//!
//! ```text
//! Uninitialized ──init──► Running ──dispose──► Stopped
//! ```
//!
//! `Stopped` is terminal; a new handle is needed to use the board again.
//! The handle is constructed explicitly and owned by the caller; share it with
//! an `Arc` when several tasks need it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::actuators::ActuatorController;
use super::button_state::{ButtonSnapshot, ButtonState, LogicalButton};
use super::error::{ControllerError, LifecycleError};
use super::sampler::Sampler;
use super::snapshot_queue::SnapshotQueue;
use crate::bus::{BusConnector, I2cConnector, RegisterDevice};
use crate::config::ControllerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Running,
    Stopped,
}

struct RunningController {
    actuators: ActuatorController,
    shutdown: CancellationToken,
    sampler: JoinHandle<()>,
}

enum Lifecycle {
    Uninitialized,
    Running(RunningController),
    Stopped,
}

impl Lifecycle {
    fn state(&self) -> LifecycleState {
        match self {
            Lifecycle::Uninitialized => LifecycleState::Uninitialized,
            Lifecycle::Running(_) => LifecycleState::Running,
            Lifecycle::Stopped => LifecycleState::Stopped,
        }
    }

    fn running(&self) -> Result<&RunningController, LifecycleError> {
        match self {
            Lifecycle::Running(running) => Ok(running),
            Lifecycle::Uninitialized => Err(LifecycleError::NotRunning),
            Lifecycle::Stopped => Err(LifecycleError::Disposed),
        }
    }
}

/// Handle for the complete controller subsystem
///
/// # Examples
///
/// ```rust,no_run
/// use megaind_controller::config::ControllerSettings;
/// use megaind_controller::controller::{ControllerHandle, LogicalButton};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let controller = ControllerHandle::with_i2c(ControllerSettings::default())?;
/// controller.init(1).await?;
///
/// let mut snapshots = controller.subscribe();
/// if let Some(snapshot) = snapshots.recv().await {
///     if snapshot.get(LogicalButton::A) {
///         controller.set_lamp(0, 50).await?;
///     }
/// }
///
/// controller.dispose().await?;
/// # Ok(())
/// # }
/// ```
pub struct ControllerHandle {
    settings: ControllerSettings,
    connector: Box<dyn BusConnector>,
    buttons: ButtonState,
    queue: Arc<SnapshotQueue>,
    lifecycle: RwLock<Lifecycle>,
}

impl ControllerHandle {
    /// Creates an uninitialized handle that opens its bus through `connector`
    pub fn new(
        settings: ControllerSettings,
        connector: impl BusConnector + 'static,
    ) -> Result<Self, ControllerError> {
        settings.validate()?;
        debug!("Creating controller handle with settings: {:?}", settings);

        Ok(Self {
            queue: Arc::new(SnapshotQueue::new(settings.queue_capacity)),
            settings,
            connector: Box::new(connector),
            buttons: ButtonState::new(),
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
        })
    }

    /// Creates a handle for the Raspberry Pi I2C bus
    pub fn with_i2c(settings: ControllerSettings) -> Result<Self, ControllerError> {
        Self::new(settings, I2cConnector)
    }

    /// Opens bus `bus_id` and starts the sampler
    ///
    /// # Errors
    ///
    /// * [`LifecycleError::AlreadyRunning`] if called twice
    /// * [`LifecycleError::Disposed`] after [`dispose`](Self::dispose)
    /// * [`ControllerError::Bus`] if the bus cannot be opened; the handle stays
    ///   uninitialized and `init` may be retried
    pub async fn init(&self, bus_id: u8) -> Result<(), ControllerError> {
        let mut lifecycle = self.lifecycle.write().await;
        match *lifecycle {
            Lifecycle::Running(_) => return Err(LifecycleError::AlreadyRunning.into()),
            Lifecycle::Stopped => return Err(LifecycleError::Disposed.into()),
            Lifecycle::Uninitialized => {}
        }

        let transport = self
            .connector
            .open(bus_id, self.settings.device_address)?;
        let device = RegisterDevice::new(transport);
        let shutdown = CancellationToken::new();

        let sampler = Sampler::create(
            device.clone(),
            self.buttons.clone(),
            self.queue.clone(),
            self.settings.sampler_settings(),
        )
        .start();
        let sampler = tokio::spawn(sampler.run(shutdown.clone()));
        let actuators =
            ActuatorController::new(device, self.settings.pwm_scaling, shutdown.clone());

        *lifecycle = Lifecycle::Running(RunningController {
            actuators,
            shutdown,
            sampler,
        });
        info!("MegaInd controller initialized on I2C bus {}", bus_id);
        Ok(())
    }

    /// Stops every task and releases the bus
    ///
    /// Safe to call in any state; only the first call on a running handle does
    /// anything. Returns once the sampler and all togglers have exited, which
    /// takes at most one tick of each.
    pub async fn dispose(&self) -> Result<(), ControllerError> {
        let mut lifecycle = self.lifecycle.write().await;
        let running = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(running) => running,
            other => {
                debug!("Dispose in state {:?}, nothing to do", other.state());
                *lifecycle = other;
                return Ok(());
            }
        };

        running.actuators.stop_all().await;
        running.shutdown.cancel();
        self.queue.close();
        if let Err(e) = running.sampler.await {
            warn!("Sampler task ended abnormally: {}", e);
        }
        // Dropping the actuators drops the last device handle and closes the bus
        drop(running.actuators);

        info!("MegaInd controller disposed");
        Ok(())
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.read().await.state()
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == LifecycleState::Running
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Last decoded state of `button`
    pub fn get_button(&self, button: LogicalButton) -> bool {
        self.buttons.get(button)
    }

    pub fn button_snapshot(&self) -> ButtonSnapshot {
        self.buttons.snapshot()
    }

    /// Queue of snapshots, one per successful tick
    ///
    /// Bounded by `queue_capacity`; when the consumer falls behind, ticks are
    /// skipped rather than queued. Ends after [`dispose`](Self::dispose).
    pub fn subscribe(&self) -> mpsc::Receiver<ButtonSnapshot> {
        self.queue.subscribe()
    }

    pub async fn set_lamp(&self, index: usize, brightness: u8) -> Result<(), ControllerError> {
        let lifecycle = self.lifecycle.read().await;
        lifecycle.running()?.actuators.set_lamp(index, brightness).await
    }

    pub async fn start_flashing(
        &self,
        index: usize,
        brightness: u8,
        interval: Duration,
    ) -> Result<(), ControllerError> {
        let lifecycle = self.lifecycle.read().await;
        lifecycle
            .running()?
            .actuators
            .start_flashing(index, brightness, interval)
            .await
    }

    pub async fn stop_flashing(&self, index: usize) -> Result<(), ControllerError> {
        let lifecycle = self.lifecycle.read().await;
        lifecycle.running()?.actuators.stop_flashing(index).await
    }

    pub async fn is_flashing(&self, index: usize) -> bool {
        let lifecycle = self.lifecycle.read().await;
        match lifecycle.running() {
            Ok(running) => running.actuators.is_flashing(index).await,
            Err(_) => false,
        }
    }

    pub async fn set_fan_speed(&self, percent: u8) -> Result<(), ControllerError> {
        let lifecycle = self.lifecycle.read().await;
        lifecycle.running()?.actuators.set_fan_speed(percent).await
    }
}

impl Drop for ControllerHandle {
    // Without an async context the tasks can only be signalled, not joined
    fn drop(&mut self) {
        if let Lifecycle::Running(running) = self.lifecycle.get_mut() {
            warn!("Controller dropped while running, cancelling its tasks");
            running.shutdown.cancel();
            self.queue.close();
        }
    }
}
