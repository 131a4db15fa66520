//! ErgRide - FTMS trainer client
//!
//! Connects to the first FTMS trainer, takes control of it and runs ride
//! sessions driven from stdin.

use anyhow::Context;
use crossbeam::channel::Receiver;
use ergride::control::{ControlEngine, PowerTargetCoordinator};
use ergride::metrics::format_elapsed;
use ergride::recording::{
    ChannelObserver, RideEvent, RideHandle, RideObserver, RideRunner, SessionController,
    SessionSettings, TracingObserver,
};
use ergride::sensors::{BleTrainer, SensorError};
use ergride::storage::load_config;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HELP: &str = "commands: start | pause | resume | end | + | - | <watts> | status | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ErgRide v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("Failed to load configuration")?;
    let profile = config.device_profile();
    tracing::info!(
        "Frame layout: {}, power encoding: {:?}",
        profile.frame_layout,
        profile.power_encoding
    );

    let (trainer, events) = BleTrainer::connect(&config.trainer)
        .await
        .context("Failed to connect to trainer")?;
    let trainer = Arc::new(trainer);
    probe_capabilities(&trainer).await;

    let (event_tx, event_rx) = crossbeam::channel::unbounded();
    let printer = tokio::task::spawn_blocking(move || print_events(event_rx));
    let observer: Arc<dyn RideObserver> = Arc::new(ChannelObserver::new(event_tx));

    let engine = Arc::new(ControlEngine::new(
        trainer.clone(),
        config.control_timing(),
        observer.clone(),
    ));
    let coordinator = Arc::new(PowerTargetCoordinator::new(
        engine.clone(),
        profile.power_encoding,
    ));
    let controller = SessionController::new(
        coordinator,
        observer,
        SessionSettings::from_config(&config),
    );
    let (runner, handle) =
        RideRunner::new(controller, engine.clone(), events, config.metrics_interval());
    let runner_task = tokio::spawn(runner.run());

    // Indications are drained by the runner while the sequence runs
    engine
        .initialize()
        .await
        .context("Failed to initialize trainer")?;
    handle
        .set_target_power(i32::from(config.ride.initial_target_watts))
        .await;
    drop(engine);

    println!("Riding on {}", trainer.name());
    println!("{}", HELP);
    read_commands(&handle).await?;

    handle.end().await;
    handle.shutdown().await;
    drop(runner_task.await.context("Ride runner panicked")?);

    if let Err(e) = trainer.disconnect().await {
        tracing::warn!("Disconnect failed: {}", e);
    }
    drop(handle);
    printer.await.context("Event printer panicked")?;

    Ok(())
}

/// Log what the trainer advertises. Missing optional characteristics are
/// not fatal.
async fn probe_capabilities(trainer: &BleTrainer) {
    match trainer.read_features().await {
        Ok(features) => {
            tracing::info!(
                "Features: power target {}, resistance target {}, simulation {}, cadence {}",
                features.supports_power_target(),
                features.supports_resistance_target(),
                features.supports_simulation(),
                features.supports_cadence()
            );
            if !features.supports_power_target() {
                tracing::warn!("Trainer does not advertise power target support; trying ERG anyway");
            }
        }
        Err(e) => tracing::warn!("Could not read trainer features: {}", e),
    }

    for (label, result) in [
        ("Machine status", trainer.read_machine_status().await),
        ("Training status", trainer.read_training_status().await),
    ] {
        match result {
            Ok(value) => tracing::debug!("{}: {:02X?}", label, value),
            Err(SensorError::Unsupported(name)) => tracing::warn!("{} not available", name),
            Err(e) => tracing::warn!("{} read failed: {}", label, e),
        }
    }
}

/// Read intents from stdin until `quit` or end of input.
async fn read_commands(handle: &RideHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match line.trim() {
            "" => {}
            "start" => {
                handle.start().await;
            }
            "pause" => {
                handle.pause().await;
            }
            "resume" => {
                handle.resume().await;
            }
            "end" => {
                handle.end().await;
            }
            "+" => {
                handle.step_up().await;
            }
            "-" => {
                handle.step_down().await;
            }
            "status" => {
                if let Some(snapshot) = handle.snapshot().await {
                    println!(
                        "{} | {} | target {}W",
                        snapshot.status,
                        format_elapsed(snapshot.elapsed),
                        snapshot.target_watts
                    );
                }
            }
            "quit" | "q" => break,
            other => match other.parse::<i32>() {
                Ok(watts) => {
                    handle.set_target_power(watts).await;
                }
                Err(_) => println!("{}", HELP),
            },
        }
    }

    Ok(())
}

/// Render ride events on stdout until every sender is gone.
fn print_events(events: Receiver<RideEvent>) {
    let log = TracingObserver;
    for event in events {
        match event {
            RideEvent::Metrics(snapshot) => println!(
                "{} | {:>4} W (target {} W) | {:>3.0} rpm | {:>5.1} {} | {:.2} {} | avg {:.0} W",
                format_elapsed(snapshot.elapsed),
                snapshot.power_watts,
                snapshot.target_watts,
                snapshot.cadence_rpm,
                snapshot.speed,
                snapshot.units.speed_label(),
                snapshot.distance,
                snapshot.units.distance_label(),
                snapshot.avg_power,
            ),
            RideEvent::SessionEnded(summary) => match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!("Failed to serialize ride summary: {}", e),
            },
            RideEvent::CommandOutcome { label, outcome } => log.on_command_outcome(&label, outcome),
        }
    }
}
