use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gimlink_driver::{DeviceState, RecordState, SendOutcome, ZoomState};
use gimlink_frame::Frame;
use gimlink_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ports),
        OutputFormat::Table => {
            let mut t = table(vec!["PATH", "KIND", "DESCRIPTION"]);
            for port in ports {
                t.add_row(vec![
                    port.path.clone(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{t}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                match &port.description {
                    Some(description) => println!("{} ({}, {description})", port.path, port.kind),
                    None => println!("{} ({})", port.path, port.kind),
                }
            }
        }
    }
}

#[derive(Serialize)]
pub struct FrameOutput {
    pub sequence: u16,
    pub command_id: u8,
    pub command: Option<String>,
    pub needs_ack: bool,
    pub is_ack: bool,
    pub payload_size: usize,
    pub payload: String,
}

impl FrameOutput {
    pub fn new(frame: &Frame, command: Option<&str>) -> Self {
        Self {
            sequence: frame.sequence,
            command_id: frame.command_id,
            command: command.map(str::to_string),
            needs_ack: frame.needs_ack,
            is_ack: frame.is_ack,
            payload_size: frame.payload.len(),
            payload: hex::encode(&frame.payload),
        }
    }

    fn flags(&self) -> String {
        match (self.needs_ack, self.is_ack) {
            (true, true) => "need-ack,ack".to_string(),
            (true, false) => "need-ack".to_string(),
            (false, true) => "ack".to_string(),
            (false, false) => "-".to_string(),
        }
    }

    fn command_label(&self) -> String {
        match &self.command {
            Some(name) => format!("{} ({name})", self.command_id),
            None => self.command_id.to_string(),
        }
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    frame: &'a FrameOutput,
    wire: String,
    wire_size: usize,
}

pub fn print_encoded(frame: &FrameOutput, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            frame,
            wire: hex::encode(wire),
            wire_size: wire.len(),
        }),
        OutputFormat::Table => {
            let mut t = table(vec!["SEQ", "CMD", "FLAGS", "SIZE", "WIRE"]);
            t.add_row(vec![
                frame.sequence.to_string(),
                frame.command_label(),
                frame.flags(),
                wire.len().to_string(),
                spaced_hex(wire),
            ]);
            println!("{t}");
        }
        OutputFormat::Pretty => println!("{}", spaced_hex(wire)),
        OutputFormat::Raw => print_raw(wire),
    }
}

/// One step of a `decode` run.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecodeEvent {
    Frame(FrameOutput),
    Discarded { bytes: usize },
    Incomplete { bytes: usize },
}

pub fn print_decode_events(events: &[DecodeEvent], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&events),
        OutputFormat::Table => {
            let mut t = table(vec!["EVENT", "SEQ", "CMD", "FLAGS", "PAYLOAD"]);
            for event in events {
                let row = match event {
                    DecodeEvent::Frame(frame) => vec![
                        "frame".to_string(),
                        frame.sequence.to_string(),
                        frame.command_label(),
                        frame.flags(),
                        frame.payload.clone(),
                    ],
                    DecodeEvent::Discarded { bytes } => gap_row("discarded", *bytes),
                    DecodeEvent::Incomplete { bytes } => gap_row("incomplete", *bytes),
                };
                t.add_row(row);
            }
            println!("{t}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for event in events {
                match event {
                    DecodeEvent::Frame(frame) => println!(
                        "frame seq={} cmd={} flags={} payload={}",
                        frame.sequence,
                        frame.command_label(),
                        frame.flags(),
                        frame.payload
                    ),
                    DecodeEvent::Discarded { bytes } => println!("discarded {bytes} bytes"),
                    DecodeEvent::Incomplete { bytes } => println!("incomplete {bytes} bytes"),
                }
            }
        }
    }
}

#[derive(Serialize)]
struct OutcomeOutput<'a> {
    endpoint: &'a str,
    command_id: u8,
    outcome: &'static str,
    attempts: u32,
    sequence: Option<u16>,
    reply: Option<FrameOutput>,
    error: Option<String>,
    state: &'a DeviceState,
}

pub fn print_outcome(
    endpoint: &str,
    command_id: u8,
    outcome: &SendOutcome,
    state: &DeviceState,
    format: OutputFormat,
) {
    let sequence = match outcome {
        SendOutcome::Sent { sequence }
        | SendOutcome::Acknowledged { sequence, .. }
        | SendOutcome::TransportFailed { sequence, .. }
        | SendOutcome::Disconnected { sequence } => Some(*sequence),
        _ => None,
    };
    let error = match outcome {
        SendOutcome::TransportFailed { error, .. } => Some(error.to_string()),
        SendOutcome::Invalid(error) => Some(error.to_string()),
        _ => None,
    };
    let out = OutcomeOutput {
        endpoint,
        command_id,
        outcome: outcome.as_str(),
        attempts: outcome.attempts(),
        sequence,
        reply: outcome.reply().map(|frame| FrameOutput::new(frame, None)),
        error,
        state,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut t = table(vec!["ENDPOINT", "CMD", "OUTCOME", "ATTEMPTS", "REPLY"]);
            t.add_row(vec![
                out.endpoint.to_string(),
                out.command_id.to_string(),
                out.outcome.to_string(),
                out.attempts.to_string(),
                out.reply
                    .as_ref()
                    .map(|reply| reply.payload.clone())
                    .or(out.error.clone())
                    .unwrap_or_default(),
            ]);
            println!("{t}");
            print_state(state, format);
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "{} cmd={} outcome={} attempts={}",
                out.endpoint, out.command_id, out.outcome, out.attempts
            );
            if let Some(reply) = &out.reply {
                println!("reply payload={}", reply.payload);
            }
            if let Some(error) = &out.error {
                println!("error: {error}");
            }
        }
    }
}

pub fn print_state(state: &DeviceState, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(state),
        OutputFormat::Table => {
            let mut t = table(vec![
                "CONNECTED", "YAW", "PITCH", "ROLL", "ZOOM", "RECORD", "RETRIES", "ERRORS",
            ]);
            t.add_row(vec![
                state.connected.to_string(),
                format!("{:.1}", state.yaw),
                format!("{:.1}", state.pitch),
                format!("{:.1}", state.roll),
                zoom_label(state.zoom_state),
                record_label(state.record_state).to_string(),
                state.retry_count.to_string(),
                state.error_count.to_string(),
            ]);
            println!("{t}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => println!(
            "connected={} yaw={:.1} pitch={:.1} roll={:.1} zoom={} record={} retries={} errors={}",
            state.connected,
            state.yaw,
            state.pitch,
            state.roll,
            zoom_label(state.zoom_state),
            record_label(state.record_state),
            state.retry_count,
            state.error_count
        ),
    }
}

fn zoom_label(zoom: ZoomState) -> String {
    match zoom {
        ZoomState::Unknown => "unknown".to_string(),
        ZoomState::Level(level) => format!("{level:.1}x"),
    }
}

fn record_label(record: RecordState) -> &'static str {
    match record {
        RecordState::Unknown => "unknown",
        RecordState::Idle => "idle",
        RecordState::Recording => "recording",
        RecordState::NoCard => "no_card",
        RecordState::Error => "error",
    }
}

fn gap_row(event: &str, bytes: usize) -> Vec<String> {
    let mut row = vec![event.to_string()];
    row.extend(std::iter::repeat_n(String::new(), 3));
    row.push(format!("{bytes} bytes"));
    row
}

pub fn spaced_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
