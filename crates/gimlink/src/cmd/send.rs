use gimlink_driver::{HeartbeatConfig, SendRequest};
use tracing::debug;

use crate::cmd::{connect, parse_duration, parse_endpoint, parse_hex, runtime, Context, SendArgs};
use crate::exit::{driver_error, outcome_code, CliError, CliResult};
use crate::output::print_outcome;

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let timeout = parse_duration(&args.timeout)?;
    let payload = parse_hex(&args.data)?;
    let spec = ctx
        .commands
        .resolve(&args.cmd)
        .map_err(|err| driver_error("invalid --cmd", err))?;

    let request = SendRequest::from_spec(spec, payload)
        .with_needs_ack(spec.needs_ack && !args.no_ack)
        .with_timeout(timeout)
        .with_max_retries(args.retries);
    debug!(cmd = request.command_id, needs_ack = request.needs_ack, "sending");

    runtime()?.block_on(async {
        let driver = connect(ctx, &endpoint, |config| {
            config.heartbeat = HeartbeatConfig::disabled();
        })
        .await?;

        let outcome = driver.send(&request).await;
        let state = driver.current_state();
        driver.disconnect().await;

        print_outcome(&endpoint.to_string(), request.command_id, &outcome, &state, ctx.format);
        Ok::<_, CliError>(outcome_code(&outcome))
    })
}
