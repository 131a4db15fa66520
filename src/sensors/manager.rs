//! BLE transport for an FTMS trainer.
//!
//! Finds the first trainer advertising the Fitness Machine service, subscribes
//! to Indoor Bike Data and the Control Point, and forwards both as raw
//! [`TransportEvent`]s. Decoding and command correlation happen elsewhere.

use crate::control::transport::ControlTransport;
use crate::sensors::ftms::{
    FitnessMachineFeatures, FTMS_CONTROL_POINT_UUID, FTMS_FEATURE_UUID, FTMS_SERVICE_UUID,
    INDOOR_BIKE_DATA_UUID, MACHINE_STATUS_UUID, TRAINING_STATUS_UUID,
};
use crate::sensors::types::{ConnectionState, SensorError, TransportEvent};
use crate::storage::config::TrainerSettings;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Capacity of the transport event channel.
const EVENT_BUFFER: usize = 64;

/// A connected FTMS trainer.
pub struct BleTrainer {
    peripheral: Peripheral,
    name: String,
    control_point: Characteristic,
    state: Arc<Mutex<ConnectionState>>,
}

impl BleTrainer {
    /// Scan for and connect to the first FTMS trainer.
    ///
    /// Returns the trainer and the stream of its notifications and
    /// indications. The stream ends with [`TransportEvent::Disconnected`]
    /// when the link drops.
    pub async fn connect(
        settings: &TrainerSettings,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), SensorError> {
        let adapter = first_adapter().await?;
        let peripheral = discover_trainer(
            &adapter,
            Duration::from_secs(u64::from(settings.discovery_timeout_secs)),
        )
        .await?;

        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name)
            .unwrap_or_else(|| "Unknown Trainer".to_string());

        tracing::info!("Connecting to {}", name);
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));

        let timeout = Duration::from_secs(u64::from(settings.connection_timeout_secs));
        tokio::time::timeout(timeout, peripheral.connect())
            .await
            .map_err(|_| SensorError::ConnectionTimeout)?
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        let bike_data = find_characteristic(&peripheral, INDOOR_BIKE_DATA_UUID)
            .ok_or_else(|| SensorError::Unsupported("Indoor Bike Data".to_string()))?;
        let control_point = find_characteristic(&peripheral, FTMS_CONTROL_POINT_UUID)
            .ok_or_else(|| SensorError::Unsupported("Fitness Machine Control Point".to_string()))?;

        for characteristic in [&bike_data, &control_point] {
            peripheral
                .subscribe(characteristic)
                .await
                .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;
            tracing::debug!("Subscribed to characteristic: {}", characteristic.uuid);
        }

        let notifications = peripheral
            .notifications()
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(forward_notifications(notifications, tx, state.clone()));

        *state.lock().unwrap_or_else(PoisonError::into_inner) = ConnectionState::Connected;
        tracing::info!("Connected to {}", name);

        Ok((
            Self {
                peripheral,
                name,
                control_point,
                state,
            },
            rx,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read an optional characteristic.
    ///
    /// A characteristic the trainer does not expose is
    /// [`SensorError::Unsupported`].
    async fn read_optional(&self, uuid: Uuid, label: &str) -> Result<Vec<u8>, SensorError> {
        let characteristic = find_characteristic(&self.peripheral, uuid)
            .ok_or_else(|| SensorError::Unsupported(label.to_string()))?;
        self.peripheral
            .read(&characteristic)
            .await
            .map_err(|e| SensorError::ReadFailed(e.to_string()))
    }

    /// Read and decode the Fitness Machine Feature characteristic.
    pub async fn read_features(&self) -> Result<FitnessMachineFeatures, SensorError> {
        let data = self.read_optional(FTMS_FEATURE_UUID, "Fitness Machine Feature").await?;
        Ok(FitnessMachineFeatures::parse(&data)?)
    }

    /// Raw Fitness Machine Status value.
    pub async fn read_machine_status(&self) -> Result<Vec<u8>, SensorError> {
        self.read_optional(MACHINE_STATUS_UUID, "Fitness Machine Status").await
    }

    /// Raw Training Status value.
    pub async fn read_training_status(&self) -> Result<Vec<u8>, SensorError> {
        self.read_optional(TRAINING_STATUS_UUID, "Training Status").await
    }

    /// Disconnect from the trainer.
    pub async fn disconnect(&self) -> Result<(), SensorError> {
        tracing::info!("Disconnecting from {}", self.name);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ConnectionState::Disconnected;
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))
    }
}

impl ControlTransport for BleTrainer {
    async fn write_command(&self, bytes: &[u8]) -> Result<(), SensorError> {
        if !self.is_connected() {
            return Err(SensorError::NotConnected);
        }
        self.peripheral
            .write(&self.control_point, bytes, WriteType::WithResponse)
            .await
            .map_err(|e| SensorError::WriteFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }
}

/// Get the first BLE adapter.
async fn first_adapter() -> Result<Adapter, SensorError> {
    let manager = Manager::new()
        .await
        .map_err(|e| SensorError::BleError(e.to_string()))?;

    manager
        .adapters()
        .await
        .map_err(|e| SensorError::BleError(e.to_string()))?
        .into_iter()
        .next()
        .ok_or(SensorError::AdapterNotFound)
}

/// Scan until a peripheral advertising FTMS shows up.
async fn discover_trainer(adapter: &Adapter, timeout: Duration) -> Result<Peripheral, SensorError> {
    tracing::info!("Scanning for FTMS trainers");

    adapter
        .start_scan(ScanFilter {
            services: vec![FTMS_SERVICE_UUID],
        })
        .await
        .map_err(|e| SensorError::ScanFailed(e.to_string()))?;

    let found = tokio::time::timeout(timeout, async {
        loop {
            if let Some(peripheral) = find_ftms_peripheral(adapter).await {
                return peripheral;
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    })
    .await;

    if let Err(e) = adapter.stop_scan().await {
        tracing::warn!("Failed to stop scan: {}", e);
    }

    found.map_err(|_| SensorError::TrainerNotFound)
}

async fn find_ftms_peripheral(adapter: &Adapter) -> Option<Peripheral> {
    let peripherals = adapter.peripherals().await.ok()?;
    for peripheral in peripherals {
        let Ok(Some(properties)) = peripheral.properties().await else {
            continue;
        };
        if properties.services.contains(&FTMS_SERVICE_UUID) {
            return Some(peripheral);
        }
    }
    None
}

fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Option<Characteristic> {
    peripheral.characteristics().into_iter().find(|c| c.uuid == uuid)
}

/// Forward notifications until the stream ends, then report the disconnect.
async fn forward_notifications(
    mut notifications: std::pin::Pin<
        Box<dyn futures::Stream<Item = btleplug::api::ValueNotification> + Send>,
    >,
    tx: mpsc::Sender<TransportEvent>,
    state: Arc<Mutex<ConnectionState>>,
) {
    use futures::stream::StreamExt;

    while let Some(notification) = notifications.next().await {
        let event = match notification.uuid {
            uuid if uuid == INDOOR_BIKE_DATA_UUID => {
                TransportEvent::TelemetryFrame(notification.value)
            }
            uuid if uuid == FTMS_CONTROL_POINT_UUID => {
                tracing::debug!("Control point indication: {:02X?}", notification.value);
                TransportEvent::ControlIndication(notification.value)
            }
            _ => continue,
        };
        if tx.send(event).await.is_err() {
            tracing::debug!("Transport event receiver dropped");
            return;
        }
    }

    // Stream ended - trainer disconnected
    *state.lock().unwrap_or_else(PoisonError::into_inner) = ConnectionState::Disconnected;
    tracing::info!("Trainer link closed");
    let _ = tx.send(TransportEvent::Disconnected).await;
}
