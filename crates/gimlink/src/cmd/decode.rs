use gimlink_frame::{FrameReader, ReadEvent, MAX_FRAME_SIZE};
use tracing::warn;

use crate::cmd::{parse_hex, Context, DecodeArgs};
use crate::exit::{CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_decode_events, DecodeEvent, FrameOutput};

/// Run the bytes through the same resynchronizing reader the driver uses.
///
/// Exits with `DATA_INVALID` when no complete frame was found.
pub fn run(args: DecodeArgs, ctx: &Context) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;

    let mut reader = FrameReader::new();
    let mut events = Vec::new();
    let mut frames = 0usize;
    for chunk in bytes.chunks(MAX_FRAME_SIZE) {
        if let Err(err) = reader.push(chunk) {
            warn!(error = %err, "decode buffer reset");
        }
        while let Some(event) = reader.next_event() {
            events.push(match event {
                ReadEvent::Frame(frame) => {
                    frames += 1;
                    DecodeEvent::Frame(FrameOutput::new(
                        &frame,
                        ctx.commands.name_of(frame.command_id),
                    ))
                }
                ReadEvent::Discarded(bytes) => DecodeEvent::Discarded { bytes },
            });
        }
    }
    if reader.buffered() > 0 {
        events.push(DecodeEvent::Incomplete {
            bytes: reader.buffered(),
        });
    }

    print_decode_events(&merge_discards(events), ctx.format);
    Ok(if frames > 0 { SUCCESS } else { DATA_INVALID })
}

/// Collapse runs of single-byte discards into one event.
fn merge_discards(events: Vec<DecodeEvent>) -> Vec<DecodeEvent> {
    let mut merged: Vec<DecodeEvent> = Vec::with_capacity(events.len());
    for event in events {
        if let DecodeEvent::Discarded { bytes } = event {
            if let Some(DecodeEvent::Discarded { bytes: total }) = merged.last_mut() {
                *total += bytes;
                continue;
            }
        }
        merged.push(event);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent_discards() {
        let merged = merge_discards(vec![
            DecodeEvent::Discarded { bytes: 1 },
            DecodeEvent::Discarded { bytes: 2 },
            DecodeEvent::Incomplete { bytes: 3 },
            DecodeEvent::Discarded { bytes: 1 },
        ]);
        assert_eq!(merged.len(), 3);
        assert!(matches!(merged[0], DecodeEvent::Discarded { bytes: 3 }));
        assert!(matches!(merged[2], DecodeEvent::Discarded { bytes: 1 }));
    }
}
