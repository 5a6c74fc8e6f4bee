//! Named command identifiers.
//!
//! Command ids are device specific and partly reverse-engineered, so they
//! live in a swappable table instead of the codec. The defaults below are the
//! mapping observed on the reference hardware; load a JSON file to override
//! any of them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

pub const CENTER: &str = "center";
pub const ROTATE_UP: &str = "rotate_up";
pub const ROTATE_DOWN: &str = "rotate_down";
pub const ROTATE_RIGHT: &str = "rotate_right";
pub const ROTATE_LEFT: &str = "rotate_left";
pub const STOP: &str = "stop";
pub const ZOOM_IN: &str = "zoom_in";
pub const ZOOM_OUT: &str = "zoom_out";
pub const TAKE_PHOTO: &str = "take_photo";
pub const RECORD_VIDEO: &str = "record_video";
/// Lightweight status query used as the keepalive probe.
pub const HEARTBEAT: &str = "heartbeat";
/// Inbound attitude report.
pub const ATTITUDE: &str = "attitude";
/// Inbound status report.
pub const STATUS: &str = "status";

/// One entry of the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub id: u8,
    /// Whether the command is sent with the needs-ACK flag by default.
    #[serde(default = "default_needs_ack")]
    pub needs_ack: bool,
}

fn default_needs_ack() -> bool {
    true
}

impl CommandSpec {
    pub const fn new(id: u8, needs_ack: bool) -> Self {
        Self { id, needs_ack }
    }
}

/// Name → command id mapping.
///
/// Serialized as a JSON object, e.g.
/// `{"heartbeat": {"id": 18}, "rotate_up": {"id": 1, "needs_ack": false}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTable {
    commands: BTreeMap<String, CommandSpec>,
}

impl Default for CommandTable {
    fn default() -> Self {
        let entries = [
            (CENTER, CommandSpec::new(0, true)),
            (ROTATE_UP, CommandSpec::new(1, false)),
            (ROTATE_DOWN, CommandSpec::new(2, false)),
            (ROTATE_RIGHT, CommandSpec::new(3, false)),
            (ROTATE_LEFT, CommandSpec::new(4, false)),
            (STOP, CommandSpec::new(5, true)),
            (ZOOM_IN, CommandSpec::new(6, true)),
            (ZOOM_OUT, CommandSpec::new(7, true)),
            (TAKE_PHOTO, CommandSpec::new(12, true)),
            (RECORD_VIDEO, CommandSpec::new(13, true)),
            (STATUS, CommandSpec::new(15, false)),
            (HEARTBEAT, CommandSpec::new(18, true)),
            (ATTITUDE, CommandSpec::new(22, false)),
        ];
        Self {
            commands: entries
                .into_iter()
                .map(|(name, spec)| (name.to_string(), spec))
                .collect(),
        }
    }
}

impl CommandTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    /// Parse JSON overrides and layer them on top of the defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let overrides: CommandTable = serde_json::from_str(json)?;
        let mut table = Self::default();
        table.merge(overrides);
        Ok(table)
    }

    /// Read JSON overrides from a file. See [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DriverError::CommandTable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Insert or replace every entry of `other`.
    pub fn merge(&mut self, other: CommandTable) {
        self.commands.extend(other.commands);
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: CommandSpec) {
        self.commands.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<CommandSpec> {
        self.commands.get(name).copied()
    }

    /// Id for a well-known name, if configured.
    pub fn id(&self, name: &str) -> Option<u8> {
        self.get(name).map(|spec| spec.id)
    }

    /// First name mapped to `id`.
    pub fn name_of(&self, id: u8) -> Option<&str> {
        self.commands
            .iter()
            .find(|(_, spec)| spec.id == id)
            .map(|(name, _)| name.as_str())
    }

    /// Resolve a command given by name or by number (`18`, `0x12`).
    ///
    /// Numeric ids not in the table default to needing an ACK.
    pub fn resolve(&self, input: &str) -> Result<CommandSpec> {
        if let Some(spec) = self.get(input) {
            return Ok(spec);
        }

        let id = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16).ok(),
            None => input.parse::<u8>().ok(),
        };
        let id = id.ok_or_else(|| DriverError::UnknownCommand(input.to_string()))?;

        Ok(self
            .commands
            .values()
            .find(|spec| spec.id == id)
            .copied()
            .unwrap_or(CommandSpec::new(id, true)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, CommandSpec)> {
        self.commands.iter().map(|(name, spec)| (name.as_str(), *spec))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_well_known_names() {
        let table = CommandTable::default();
        assert_eq!(table.id(HEARTBEAT), Some(18));
        assert_eq!(table.id(ATTITUDE), Some(22));
        assert_eq!(table.id(STATUS), Some(15));
        assert_eq!(table.get(ROTATE_UP), Some(CommandSpec::new(1, false)));
        assert_eq!(table.name_of(13), Some(RECORD_VIDEO));
    }

    #[test]
    fn json_overrides_merge_over_defaults() {
        let table =
            CommandTable::from_json_str(r#"{"heartbeat": {"id": 10}, "laser": {"id": 21, "needs_ack": false}}"#)
                .unwrap();
        assert_eq!(table.get(HEARTBEAT), Some(CommandSpec::new(10, true)));
        assert_eq!(table.get("laser"), Some(CommandSpec::new(21, false)));
        assert_eq!(table.id(CENTER), Some(0));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = CommandTable::from_json_str(r#"{"heartbeat": {"id": 300}}"#).unwrap_err();
        assert!(matches!(err, DriverError::Json(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = CommandTable::from_json_file("/nonexistent/gimlink-commands.json").unwrap_err();
        assert!(matches!(err, DriverError::CommandTable { .. }));
    }

    #[test]
    fn resolves_names_and_numbers() {
        let table = CommandTable::default();
        assert_eq!(table.resolve("zoom_in").unwrap(), CommandSpec::new(6, true));
        assert_eq!(table.resolve("3").unwrap(), CommandSpec::new(3, false));
        assert_eq!(table.resolve("0x12").unwrap(), CommandSpec::new(18, true));
        assert_eq!(table.resolve("200").unwrap(), CommandSpec::new(200, true));
        assert!(matches!(
            table.resolve("warp_drive"),
            Err(DriverError::UnknownCommand(_))
        ));
        assert!(table.resolve("256").is_err());
    }

    #[test]
    fn empty_table() {
        let mut table = CommandTable::empty();
        assert!(table.is_empty());
        table.insert("ping", CommandSpec::new(1, true));
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next(), Some(("ping", CommandSpec::new(1, true))));
    }
}
