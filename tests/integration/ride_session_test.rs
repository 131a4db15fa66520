//! End-to-end ride tests against the simulated trainer.
//!
//! Engine, coordinator, session controller and runner are wired exactly as
//! the binary wires them, with `MockTransport` in place of BLE.

use crate::sensor_mock::{mock_trainer, MockSensorData, MockTransport, TrainerBehavior};
use crossbeam::channel::Receiver;
use ergride::control::{
    CommandOutcome, ControlEngine, PowerEncoding, PowerTargetCoordinator, ResultCode,
};
use ergride::recording::{
    ChannelObserver, RideEvent, RideHandle, RideObserver, RideRunner, SessionController,
    SessionSettings, SessionStatus,
};
use ergride::sensors::types::TransportEvent;
use ergride::storage::config::Units;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Rig {
    handle: RideHandle,
    engine: Arc<ControlEngine<MockTransport>>,
    transport: Arc<MockTransport>,
    events: mpsc::Sender<TransportEvent>,
    observed: Receiver<RideEvent>,
    task: JoinHandle<SessionController<MockTransport>>,
}

fn rig(behavior: TrainerBehavior, encoding: PowerEncoding) -> Rig {
    let trainer = mock_trainer(behavior);
    let (tx, observed) = crossbeam::channel::unbounded();
    let observer: Arc<dyn RideObserver> = Arc::new(ChannelObserver::new(tx));

    let engine = Arc::new(ControlEngine::new(
        trainer.transport.clone(),
        Default::default(),
        observer.clone(),
    ));
    let coordinator = Arc::new(PowerTargetCoordinator::new(engine.clone(), encoding));
    let settings = SessionSettings {
        units: Units::Metric,
        ..SessionSettings::default()
    };
    let controller = SessionController::new(coordinator, observer, settings);
    let (runner, handle) = RideRunner::new(
        controller,
        engine.clone(),
        trainer.receiver,
        Duration::from_secs(1),
    );

    Rig {
        handle,
        engine,
        transport: trainer.transport,
        events: trainer.events,
        observed,
        task: tokio::spawn(runner.run()),
    }
}

fn outcomes(observed: &Receiver<RideEvent>) -> Vec<(String, CommandOutcome)> {
    observed
        .try_iter()
        .filter_map(|event| match event {
            RideEvent::CommandOutcome { label, outcome } => Some((label, outcome)),
            _ => None,
        })
        .collect()
}

async fn ride_for(rig: &Rig, seconds: u32, frame: &[u8]) {
    for _ in 0..seconds {
        rig.events
            .send(TransportEvent::TelemetryFrame(frame.to_vec()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_ride_with_pause() {
    let rig = rig(TrainerBehavior::Acknowledge, PowerEncoding::Watts);
    let frame = MockSensorData::default().generate_ftms_indoor_bike_data();

    rig.engine.initialize().await.unwrap();
    rig.handle.start().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
    ride_for(&rig, 10, &frame).await;

    rig.handle.pause().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    // Live values only while paused
    rig.events
        .send(TransportEvent::TelemetryFrame(frame.clone()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    rig.handle.resume().await;
    ride_for(&rig, 5, &frame).await;

    let summary = rig.handle.end().await.unwrap();
    assert!((summary.duration_seconds - 15.0).abs() < 0.1);
    assert_eq!(summary.duration, "00:15");
    assert_eq!(summary.sample_count, 15);
    assert_eq!(summary.power.average, 200.0);
    assert_eq!(summary.cadence.maximum, 90.0);
    assert!((summary.distance - 0.15).abs() < 1e-9);

    assert_eq!(
        rig.transport.writes(),
        vec![vec![0x00], vec![0x01], vec![0x07], vec![0x05, 0x32, 0x00]]
    );
    assert!(outcomes(&rig.observed)
        .iter()
        .all(|(_, outcome)| *outcome == CommandOutcome::Acknowledged(ResultCode::Success)));

    rig.handle.shutdown().await;
    let controller = rig.task.await.unwrap();
    assert_eq!(controller.status(), SessionStatus::Ended);
}

#[tokio::test(start_paused = true)]
async fn test_erg_burst_converges_on_last_value() {
    let rig = rig(
        TrainerBehavior::Delay(Duration::from_secs(1)),
        PowerEncoding::Watts,
    );

    rig.handle.start().await;
    for _ in 0..5 {
        rig.handle.step_up().await;
    }
    tokio::time::sleep(Duration::from_secs(5)).await;

    let writes = rig.transport.writes();
    assert_eq!(writes.last(), Some(&vec![0x05, 75, 0x00]));
    assert!(writes.len() < 6);
    assert_eq!(writes[0], vec![0x05, 50, 0x00]);

    let snapshot = rig.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.target_watts, 75);
}

#[tokio::test(start_paused = true)]
async fn test_rejections_do_not_stop_initialization() {
    let rig = rig(TrainerBehavior::Reject(0x05), PowerEncoding::Watts);

    rig.engine.initialize().await.unwrap();

    let labels: Vec<(String, CommandOutcome)> = outcomes(&rig.observed);
    assert_eq!(labels.len(), 3);
    assert!(labels.iter().all(|(_, outcome)| outcome.is_rejected()));
    assert_eq!(labels[0].0, "Request Control");
    assert_eq!(labels[2].0, "Start/Resume");
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_command_and_ends_ride() {
    let rig = rig(TrainerBehavior::Silent, PowerEncoding::Watts);

    rig.handle.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    rig.transport.set_connected(false);
    rig.events.send(TransportEvent::Disconnected).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let events: Vec<RideEvent> = rig.observed.try_iter().collect();
    assert!(events.iter().any(|event| matches!(
        event,
        RideEvent::CommandOutcome { outcome: CommandOutcome::TimedOut, .. }
    )));
    assert!(events
        .iter()
        .any(|event| matches!(event, RideEvent::SessionEnded(_))));

    // Nothing more is written while the link is down
    rig.handle.step_up().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(rig.transport.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_trainer_recovers_after_silence() {
    let rig = rig(TrainerBehavior::Silent, PowerEncoding::Watts);

    rig.handle.start().await;
    // Response timeout plus settle delay
    tokio::time::sleep(Duration::from_secs(4)).await;

    rig.transport.set_behavior(TrainerBehavior::Acknowledge);
    rig.handle.step_up().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        outcomes(&rig.observed),
        vec![
            ("Set Power 50W".to_string(), CommandOutcome::TimedOut),
            (
                "Set Power 55W".to_string(),
                CommandOutcome::Acknowledged(ResultCode::Success)
            ),
        ]
    );
    assert_eq!(
        rig.transport.writes(),
        vec![vec![0x05, 50, 0x00], vec![0x05, 55, 0x00]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_deci_watt_trainer() {
    let rig = rig(
        TrainerBehavior::Acknowledge,
        PowerEncoding::DeciWatts { opcode: 0x05 },
    );

    rig.handle.set_target_power(200).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    // 2000 = 0x07D0
    assert_eq!(rig.transport.writes(), vec![vec![0x05, 0xD0, 0x07]]);
}

#[tokio::test(start_paused = true)]
async fn test_ride_without_trainer() {
    let rig = rig(TrainerBehavior::Acknowledge, PowerEncoding::Watts);
    rig.transport.set_connected(false);

    rig.handle.start().await;
    rig.handle.set_target_power(180).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let snapshot = rig.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Active);
    assert_eq!(snapshot.target_watts, 180);
    assert!(rig.transport.writes().is_empty());
}
