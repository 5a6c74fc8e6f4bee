//! Per-command decoders for unsolicited device reports.
//!
//! Report layouts vary between firmware revisions, so decoding is a lookup
//! keyed by command id that callers can extend or replace.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gimlink_frame::Frame;

use crate::commands::{self, CommandTable};
use crate::state::{DeviceState, RecordState, ZoomState};

/// Applies one report payload to the device state.
pub trait StateDecoder: Send + Sync {
    /// Returns `false` if the payload was not understood and left no trace.
    fn apply(&self, payload: &[u8], state: &mut DeviceState) -> bool;
}

impl<F> StateDecoder for F
where
    F: Fn(&[u8], &mut DeviceState) -> bool + Send + Sync,
{
    fn apply(&self, payload: &[u8], state: &mut DeviceState) -> bool {
        self(payload, state)
    }
}

/// Three little-endian `i16` angles in tenths of a degree: yaw, pitch, roll.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttitudeDecoder;

impl StateDecoder for AttitudeDecoder {
    fn apply(&self, payload: &[u8], state: &mut DeviceState) -> bool {
        let [y0, y1, p0, p1, r0, r1, ..] = *payload else {
            return false;
        };
        state.yaw = f32::from(i16::from_le_bytes([y0, y1])) / 10.0;
        state.pitch = f32::from(i16::from_le_bytes([p0, p1])) / 10.0;
        state.roll = f32::from(i16::from_le_bytes([r0, r1])) / 10.0;
        true
    }
}

/// Record-state code, then zoom as whole and tenths bytes.
///
/// A one-byte payload updates only the record state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusDecoder;

impl StateDecoder for StatusDecoder {
    fn apply(&self, payload: &[u8], state: &mut DeviceState) -> bool {
        match *payload {
            [record, whole, tenths, ..] => {
                state.record_state = RecordState::from_code(record);
                state.zoom_state = ZoomState::Level(f32::from(whole) + f32::from(tenths) / 10.0);
                true
            }
            [record, ..] => {
                state.record_state = RecordState::from_code(record);
                true
            }
            [] => false,
        }
    }
}

/// Command id → decoder.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<u8, Arc<dyn StateDecoder>>,
}

impl DecoderRegistry {
    /// A registry with no decoders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attitude and status decoders at the ids the table assigns them.
    pub fn with_defaults(table: &CommandTable) -> Self {
        let mut registry = Self::new();
        if let Some(id) = table.id(commands::ATTITUDE) {
            registry.register(id, AttitudeDecoder);
        }
        if let Some(id) = table.id(commands::STATUS) {
            registry.register(id, StatusDecoder);
        }
        registry
    }

    /// Install `decoder` for `command_id`, replacing any previous one.
    pub fn register(&mut self, command_id: u8, decoder: impl StateDecoder + 'static) {
        self.decoders.insert(command_id, Arc::new(decoder));
    }

    pub fn remove(&mut self, command_id: u8) -> bool {
        self.decoders.remove(&command_id).is_some()
    }

    pub fn contains(&self, command_id: u8) -> bool {
        self.decoders.contains_key(&command_id)
    }

    /// Decode `frame` into `state`. Unknown command ids are ignored.
    pub fn apply(&self, frame: &Frame, state: &mut DeviceState) -> bool {
        self.decoders
            .get(&frame.command_id)
            .is_some_and(|decoder| decoder.apply(&frame.payload, state))
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<u8> = self.decoders.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("DecoderRegistry")
            .field("command_ids", &ids)
            .finish()
    }
}
