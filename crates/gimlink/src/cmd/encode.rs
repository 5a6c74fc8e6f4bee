use std::io::Write;

use gimlink_frame::{Frame, FrameWriter, PacketCodec};

use crate::cmd::{parse_hex, Context, EncodeArgs};
use crate::exit::{driver_error, frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_encoded, FrameOutput, OutputFormat};

pub fn run(args: EncodeArgs, ctx: &Context) -> CliResult<i32> {
    let spec = ctx
        .commands
        .resolve(&args.cmd)
        .map_err(|err| driver_error("invalid --cmd", err))?;
    let payload = parse_hex(&args.data)?;

    let mut frame = Frame::new(args.seq, spec.id, payload).with_needs_ack(args.need_ack);
    frame.is_ack = args.ack;

    if args.raw || matches!(ctx.format, OutputFormat::Raw) {
        let stdout = std::io::stdout();
        let mut writer = FrameWriter::new(stdout.lock());
        writer
            .write_frame(&frame)
            .map_err(|err| frame_error("write failed", err))?;
        writer
            .into_inner()
            .flush()
            .map_err(|err| io_error("flush failed", err))?;
        return Ok(SUCCESS);
    }

    let wire = PacketCodec::default()
        .encode(&frame)
        .map_err(|err| frame_error("encode failed", err))?;
    let out = FrameOutput::new(&frame, ctx.commands.name_of(frame.command_id));
    print_encoded(&out, &wire, ctx.format);
    Ok(SUCCESS)
}
