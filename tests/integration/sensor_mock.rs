//! Mock trainer transport.
//!
//! `MockTransport` records every control point write and hands it to a
//! simulated trainer task that answers on the transport event stream, the
//! same path BLE indications take.

use ergride::control::transport::ControlTransport;
use ergride::sensors::ftms::decode_indoor_bike_data;
use ergride::sensors::types::{FrameLayout, SensorError, TransportEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How the simulated trainer answers control point writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerBehavior {
    /// Indicate success right away
    Acknowledge,
    /// Indicate the given result code
    Reject(u8),
    /// Indicate success after a delay
    Delay(Duration),
    /// Never indicate
    Silent,
}

/// Records writes and forwards them to the simulated trainer.
pub struct MockTransport {
    writes: Mutex<Vec<Vec<u8>>>,
    connected: AtomicBool,
    behavior: Arc<Mutex<TrainerBehavior>>,
    trainer: mpsc::UnboundedSender<Vec<u8>>,
}

impl MockTransport {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn set_behavior(&self, behavior: TrainerBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl ControlTransport for MockTransport {
    async fn write_command(&self, bytes: &[u8]) -> Result<(), SensorError> {
        if !self.is_connected() {
            return Err(SensorError::NotConnected);
        }
        self.writes.lock().unwrap().push(bytes.to_vec());
        let _ = self.trainer.send(bytes.to_vec());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// A mock transport plus both ends of its event stream.
pub struct MockTrainer {
    pub transport: Arc<MockTransport>,
    /// Inject telemetry or disconnects
    pub events: mpsc::Sender<TransportEvent>,
    /// Consumed by the ride runner
    pub receiver: mpsc::Receiver<TransportEvent>,
}

/// Spawn a simulated trainer with the given initial behavior.
pub fn mock_trainer(behavior: TrainerBehavior) -> MockTrainer {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let behavior = Arc::new(Mutex::new(behavior));

    let transport = Arc::new(MockTransport {
        writes: Mutex::new(Vec::new()),
        connected: AtomicBool::new(true),
        behavior: behavior.clone(),
        trainer: write_tx,
    });

    let indications = event_tx.clone();
    tokio::spawn(async move {
        while let Some(bytes) = write_rx.recv().await {
            let Some(&opcode) = bytes.first() else {
                continue;
            };
            let current = *behavior.lock().unwrap();
            let (delay, code) = match current {
                TrainerBehavior::Acknowledge => (Duration::ZERO, 0x01),
                TrainerBehavior::Reject(code) => (Duration::ZERO, code),
                TrainerBehavior::Delay(delay) => (delay, 0x01),
                TrainerBehavior::Silent => continue,
            };
            let indications = indications.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = indications
                    .send(TransportEvent::ControlIndication(vec![0x80, opcode, code]))
                    .await;
            });
        }
    });

    MockTrainer {
        transport,
        events: event_tx,
        receiver: event_rx,
    }
}

/// Mock sensor data generator for testing.
pub struct MockSensorData {
    /// Current power value
    pub power: i16,
    /// Current cadence (in 0.5 RPM)
    pub cadence: u16,
    /// Current speed (in 0.01 km/h)
    pub speed: u16,
    /// Current heart rate
    pub heart_rate: Option<u8>,
}

impl Default for MockSensorData {
    fn default() -> Self {
        Self {
            power: 200,
            cadence: 180, // 90 RPM (0.5 resolution)
            speed: 3600,  // 36.0 km/h
            heart_rate: None,
        }
    }
}

impl MockSensorData {
    /// Generate an Indoor Bike Data packet with mandatory speed.
    pub fn generate_ftms_indoor_bike_data(&self) -> Vec<u8> {
        // Flags: cadence + power, optionally heart rate
        let flags: u16 = if self.heart_rate.is_some() { 0x0244 } else { 0x0044 };
        let mut data = flags.to_le_bytes().to_vec();
        data.extend_from_slice(&self.speed.to_le_bytes());
        data.extend_from_slice(&self.cadence.to_le_bytes());
        data.extend_from_slice(&self.power.to_le_bytes());
        if let Some(hr) = self.heart_rate {
            data.push(hr);
        }
        data
    }
}

#[test]
fn test_mock_ftms_data_generation() {
    let mock = MockSensorData {
        heart_rate: Some(142),
        ..Default::default()
    };
    let data = mock.generate_ftms_indoor_bike_data();

    let sample = decode_indoor_bike_data(&data, FrameLayout::MandatorySpeed).unwrap();
    assert!((sample.speed_kmh - 36.0).abs() < 1e-9);
    assert_eq!(sample.cadence_rpm, 90.0);
    assert_eq!(sample.power_watts, 200);
    assert_eq!(sample.heart_rate_bpm, Some(142));
}

#[tokio::test]
async fn test_simulated_trainer_acknowledges_writes() {
    let mut trainer = mock_trainer(TrainerBehavior::Reject(0x05));
    trainer.transport.write_command(&[0x00]).await.unwrap();

    assert_eq!(
        trainer.receiver.recv().await,
        Some(TransportEvent::ControlIndication(vec![0x80, 0x00, 0x05]))
    );
    assert_eq!(trainer.transport.writes(), vec![vec![0x00]]);
}
