use bytes::Bytes;
use gimlink_driver::{commands, HeartbeatConfig, SendRequest};

use crate::cmd::{connect, parse_duration, parse_endpoint, runtime, Context, ProbeArgs};
use crate::exit::{outcome_code, CliError, CliResult, USAGE};
use crate::output::print_outcome;

pub fn run(args: ProbeArgs, ctx: &Context) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let timeout = parse_duration(&args.timeout)?;
    let spec = ctx.commands.get(commands::HEARTBEAT).ok_or_else(|| {
        CliError::new(USAGE, "command table has no 'heartbeat' entry")
    })?;

    runtime()?.block_on(async {
        // The probe below is the only traffic; no background keepalive.
        let driver = connect(ctx, &endpoint, |config| {
            config.heartbeat = HeartbeatConfig::disabled();
        })
        .await?;

        let request = SendRequest::new(spec.id, Bytes::new())
            .with_timeout(timeout)
            .with_max_retries(args.retries);
        let outcome = driver.send(&request).await;
        let state = driver.current_state();
        driver.disconnect().await;

        print_outcome(&endpoint.to_string(), spec.id, &outcome, &state, ctx.format);
        Ok::<_, CliError>(outcome_code(&outcome))
    })
}
