//! Keepalive probing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::correlator::{Correlator, SendRequest};

/// Periodically sends a status query while the device is connected.
///
/// Probes run one at a time: the next tick is not taken until the previous
/// probe has been acknowledged or exhausted its retries. Failed probes only
/// bump the retry/error counters; they never tear the link down.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    probes: Arc<AtomicU64>,
}

impl HeartbeatMonitor {
    /// Start probing every `interval` until `cancel` fires or the device
    /// reports disconnected.
    pub fn spawn(
        correlator: Arc<Correlator>,
        probe: SendRequest,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let probes = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(heartbeat_loop(
            correlator,
            probe,
            interval,
            cancel.clone(),
            Arc::clone(&probes),
        ));
        Self {
            cancel,
            task,
            probes,
        }
    }

    /// Probes issued so far.
    pub fn probes_sent(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel and wait for the task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            debug!(error = %err, "heartbeat task ended abnormally");
        }
    }
}

async fn heartbeat_loop(
    correlator: Arc<Correlator>,
    probe: SendRequest,
    interval: Duration,
    cancel: CancellationToken,
    probes: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !correlator.state().is_connected() {
            break;
        }

        probes.fetch_add(1, Ordering::Relaxed);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = correlator.send(&probe) => outcome,
        };
        if outcome.is_success() {
            trace!(attempts = outcome.attempts(), "heartbeat acknowledged");
        } else {
            debug!(outcome = outcome.as_str(), "heartbeat failed");
        }
    }

    debug!("heartbeat stopped");
}
