use serde::Serialize;

use crate::cmd::{Context, VersionArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{spaced_hex, OutputFormat};

/// Build and protocol details reported by `version --extended`.
#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    git_hash: &'static str,
    rustc: &'static str,
    marker: String,
    max_payload: usize,
    default_baud: u32,
}

impl BuildInfo {
    fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            target: env!("GIMLINK_BUILD_TARGET"),
            git_hash: option_env!("GIMLINK_GIT_HASH").unwrap_or("unknown"),
            rustc: option_env!("GIMLINK_RUSTC_VERSION").unwrap_or("unknown"),
            marker: spaced_hex(&gimlink_frame::MARKER.to_le_bytes()),
            max_payload: gimlink_frame::MAX_PAYLOAD,
            default_baud: gimlink_transport::DEFAULT_BAUD,
        }
    }
}

pub fn run(args: VersionArgs, ctx: &Context) -> CliResult<i32> {
    let info = BuildInfo::current();
    if !args.extended {
        println!("{} {}", info.name, info.version);
        return Ok(SUCCESS);
    }

    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => {
            println!("{} {} ({})", info.name, info.version, info.target);
            println!("  git {}, {}", info.git_hash, info.rustc);
            println!(
                "  wire: marker {}, payload <= {} bytes, serial default {} baud",
                info.marker, info.max_payload, info.default_baud
            );
        }
    }
    Ok(SUCCESS)
}
