use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cmd::{connect, parse_duration, parse_endpoint, runtime, Context, MonitorArgs};
use crate::exit::{CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::print_state;

/// Print state snapshots on a fixed cadence while the heartbeat keeps the
/// link alive.
pub fn run(args: MonitorArgs, ctx: &Context) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let interval = parse_duration(&args.interval)?;

    runtime()?.block_on(async {
        let driver = connect(ctx, &endpoint, |config| {
            config.heartbeat.enabled = !args.no_heartbeat;
        })
        .await?;
        info!(endpoint = %endpoint, "monitoring");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut printed = 0usize;
        let mut code = SUCCESS;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let state = driver.current_state();
            print_state(&state, ctx.format);
            printed = printed.saturating_add(1);

            if !state.connected {
                warn!("link lost");
                code = TRANSPORT_ERROR;
                break;
            }
            if args.count.is_some_and(|count| printed >= count) {
                break;
            }
        }

        driver.disconnect().await;
        Ok::<_, CliError>(code)
    })
}
