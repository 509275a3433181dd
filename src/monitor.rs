//! Per-team health monitor
//!
//! One monitor task runs per registration. Each tick it reads the team's
//! current address, polls it with a bounded timeout, writes the outcome back
//! to the registry and sleeps. It stops when told to or when its registration
//! no longer exists.

use crate::poll::{PollError, Prober};
use crate::registry::TeamRegistry;
use crate::tokens::TeamId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for team monitors
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Pause between the end of one poll and the start of the next
    pub poll_interval: Duration,
    /// How long a poll may take before it is reported as timed out
    pub poll_timeout: Duration,
    /// Hard cap on a single HTTP request, abandoned ones included
    pub request_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Background poller bound to one registration of one team
pub struct TeamMonitor {
    team: TeamId,
    generation: u64,
    registry: Arc<TeamRegistry>,
    prober: Arc<dyn Prober>,
    config: MonitorConfig,
    shutdown_rx: watch::Receiver<bool>,
}

impl TeamMonitor {
    /// Run until shut down or until the registration disappears
    pub async fn run(mut self) {
        info!(team = %self.team, "Monitor started");
        let mut healthy: Option<bool> = None;

        loop {
            let address = match self.registry.address_for(self.team, self.generation) {
                Ok(address) => address,
                Err(_) => break,
            };

            let outcome = tokio::select! {
                outcome = poll_with_timeout(self.prober.clone(), address, self.config.poll_timeout) => outcome,
                _ = self.shutdown_rx.changed() => break,
            };

            let written = match outcome {
                Ok(message) => {
                    if healthy != Some(true) {
                        info!(team = %self.team, "Team server is up");
                    }
                    healthy = Some(true);
                    self.registry
                        .set_status_ok(self.team, self.generation, message)
                }
                Err(err) => {
                    if healthy != Some(false) {
                        warn!(team = %self.team, error = %err, "Team server poll failed");
                    } else {
                        debug!(team = %self.team, error = %err, "Team server still failing");
                    }
                    healthy = Some(false);
                    self.registry
                        .set_status_error(self.team, self.generation, err.to_string())
                }
            };
            if written.is_err() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.shutdown_rx.changed() => break,
            }
        }

        info!(team = %self.team, "Monitor stopped");
    }
}

/// Race one poll attempt against `timeout`.
///
/// The attempt runs as its own task. If the timer wins, the task is left to
/// finish on its own and its result is dropped with the join handle; the
/// prober's transport is responsible for bounding its lifetime.
pub async fn poll_with_timeout(
    prober: Arc<dyn Prober>,
    address: String,
    timeout: Duration,
) -> Result<String, PollError> {
    let attempt = tokio::spawn(async move { prober.fetch_message(&address).await });

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(PollError::Aborted(join_err.to_string())),
        Err(_) => Err(PollError::Timeout),
    }
}

struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    fn stop(self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Running monitors keyed by team
///
/// Starting a monitor for a team that already has one stops the old one.
pub struct MonitorSet {
    registry: Arc<TeamRegistry>,
    prober: Arc<dyn Prober>,
    config: MonitorConfig,
    monitors: Mutex<HashMap<TeamId, MonitorHandle>>,
}

impl MonitorSet {
    pub fn new(registry: Arc<TeamRegistry>, prober: Arc<dyn Prober>, config: MonitorConfig) -> Self {
        Self {
            registry,
            prober,
            config,
            monitors: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn the monitor for `generation` of `team`. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, team: TeamId, generation: u64) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = TeamMonitor {
            team,
            generation,
            registry: self.registry.clone(),
            prober: self.prober.clone(),
            config: self.config.clone(),
            shutdown_rx,
        };
        let task = tokio::spawn(monitor.run());

        let previous = self
            .monitors
            .lock()
            .insert(team, MonitorHandle { shutdown_tx, task });
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    /// Signal the monitor for `team` to stop; no-op if none is running
    pub fn stop(&self, team: TeamId) -> bool {
        match self.monitors.lock().remove(&team) {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Whether a monitor task for `team` is still running
    pub fn is_running(&self, team: TeamId) -> bool {
        self.monitors
            .lock()
            .get(&team)
            .map(|h| !h.task.is_finished())
            .unwrap_or(false)
    }

    /// Stop every monitor
    pub fn shutdown(&self) {
        let handles: Vec<_> = self.monitors.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.stop();
        }
    }
}

impl Drop for MonitorSet {
    fn drop(&mut self) {
        self.shutdown();
    }
}
