use color_eyre::{eyre::eyre, Result};
use megaind_controller::config;
use megaind_controller::controller::{ButtonSnapshot, ControllerHandle, LogicalButton};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = config::load_settings().await?;
    info!("Initializing controller with settings: {:?}", settings);

    let controller = Arc::new(
        ControllerHandle::with_i2c(settings.clone())
            .map_err(|e| eyre!("Failed to create controller: {}", e))?,
    );
    controller
        .init(settings.bus_id)
        .await
        .map_err(|e| eyre!("Failed to initialize MegaInd controller: {}", e))?;

    let mut snapshots = controller.subscribe();
    let demo = controller.clone();
    let consumer = tokio::spawn(async move {
        let mut previous = demo.button_snapshot();
        while let Some(snapshot) = snapshots.recv().await {
            react(&demo, &previous, &snapshot).await;
            previous = snapshot;
        }
        debug!("Snapshot queue closed");
    });

    info!("MegaInd controller running... Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    controller.dispose().await?;
    if let Err(e) = consumer.await {
        warn!("Snapshot consumer ended abnormally: {}", e);
    }
    Ok(())
}

// Demo mapping: buttons drive the lamps and the fan
async fn react(controller: &ControllerHandle, previous: &ButtonSnapshot, current: &ButtonSnapshot) {
    for button in LogicalButton::ALL {
        let was = previous.get(button);
        let is = current.get(button);
        if was == is {
            continue;
        }
        if is {
            info!("Button {} pressed", button);
        }

        let result = match (button, is) {
            (LogicalButton::A, true) => controller.set_lamp(0, 50).await,
            (LogicalButton::A, false) => controller.set_lamp(0, 0).await,
            (LogicalButton::B, true) => {
                controller
                    .start_flashing(1, 75, Duration::from_millis(500))
                    .await
            }
            (LogicalButton::X, true) => controller.stop_flashing(1).await,
            (LogicalButton::Y, true) => controller.set_fan_speed(50).await,
            (LogicalButton::Up, true) => controller.set_fan_speed(100).await,
            (LogicalButton::Down, true) => controller.set_fan_speed(25).await,
            _ => Ok(()),
        };
        if let Err(e) = result {
            error!("Failed to handle button {}: {}", button, e);
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
