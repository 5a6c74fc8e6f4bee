//! Device status shared between the driver tasks and status readers.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};

/// Camera recording state as last reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    #[default]
    Unknown,
    Idle,
    Recording,
    NoCard,
    Error,
}

impl RecordState {
    /// Map a device record-state code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Recording,
            2 => Self::NoCard,
            3 => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// Zoom level as last reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomState {
    #[default]
    Unknown,
    Level(f32),
}

/// Snapshot of everything the driver knows about the device.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DeviceState {
    pub connected: bool,
    /// Degrees.
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub zoom_state: ZoomState,
    pub record_state: RecordState,
    #[serde(serialize_with = "serialize_unix_seconds")]
    pub last_ack_timestamp: Option<SystemTime>,
    /// ACK timeouts observed this connection.
    pub retry_count: u64,
    /// Transport and framing failures observed this connection.
    pub error_count: u64,
}

fn serialize_unix_seconds<S>(value: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let seconds = value
        .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs_f64());
    seconds.serialize(serializer)
}

/// `DeviceState` behind a lock.
///
/// Every mutation happens inside one critical section and readers get a
/// cloned copy, so a snapshot never observes a half-applied update.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<DeviceState>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` atomically with respect to snapshots.
    pub fn update<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> DeviceState {
        self.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Start a new connection: set `connected` and zero the counters.
    ///
    /// Last known attitude, zoom, record state and ACK time are kept.
    pub fn mark_connected(&self) {
        self.update(|state| {
            state.connected = true;
            state.retry_count = 0;
            state.error_count = 0;
        });
    }

    pub fn mark_disconnected(&self) {
        self.update(|state| state.connected = false);
    }

    pub fn record_retry(&self) {
        self.update(|state| state.retry_count += 1);
    }

    pub fn record_error(&self) {
        self.update(|state| state.error_count += 1);
    }

    pub fn record_ack(&self, at: SystemTime) {
        self.update(|state| state.last_ack_timestamp = Some(at));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn reconnect_resets_only_connection_and_counters() {
        let shared = SharedState::new();
        shared.mark_connected();
        shared.update(|state| {
            state.yaw = 12.5;
            state.record_state = RecordState::Recording;
        });
        shared.record_retry();
        shared.record_error();
        shared.record_ack(UNIX_EPOCH + Duration::from_secs(10));
        shared.mark_disconnected();

        let before = shared.snapshot();
        assert!(!before.connected);
        assert_eq!(before.retry_count, 1);
        assert_eq!(before.error_count, 1);

        shared.mark_connected();
        let after = shared.snapshot();
        assert!(after.connected);
        assert_eq!(after.retry_count, 0);
        assert_eq!(after.error_count, 0);
        assert_eq!(after.yaw, 12.5);
        assert_eq!(after.record_state, RecordState::Recording);
        assert_eq!(after.last_ack_timestamp, before.last_ack_timestamp);
    }

    #[test]
    fn snapshots_are_never_torn() {
        let shared = Arc::new(SharedState::new());
        let writer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    let v = i as f32;
                    shared.update(|state| {
                        state.yaw = v;
                        state.pitch = v;
                        state.roll = v;
                    });
                }
            })
        };

        for _ in 0..10_000 {
            let snap = shared.snapshot();
            assert_eq!(snap.yaw, snap.pitch);
            assert_eq!(snap.pitch, snap.roll);
        }
        writer.join().unwrap();
    }

    #[test]
    fn record_codes() {
        assert_eq!(RecordState::from_code(0), RecordState::Idle);
        assert_eq!(RecordState::from_code(1), RecordState::Recording);
        assert_eq!(RecordState::from_code(2), RecordState::NoCard);
        assert_eq!(RecordState::from_code(3), RecordState::Error);
        assert_eq!(RecordState::from_code(42), RecordState::Unknown);
    }

    #[test]
    fn serializes_for_publication() {
        let state = DeviceState {
            connected: true,
            zoom_state: ZoomState::Level(2.5),
            record_state: RecordState::NoCard,
            last_ack_timestamp: Some(UNIX_EPOCH + Duration::from_secs(3)),
            ..DeviceState::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["connected"], true);
        assert_eq!(json["zoom_state"]["level"], 2.5);
        assert_eq!(json["record_state"], "no_card");
        assert_eq!(json["last_ack_timestamp"], 3.0);

        let idle = serde_json::to_value(DeviceState::default()).unwrap();
        assert_eq!(idle["zoom_state"], "unknown");
        assert!(idle["last_ack_timestamp"].is_null());
    }
}
