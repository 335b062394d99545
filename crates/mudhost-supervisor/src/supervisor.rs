//! The supervisor loop and its restart decision core.
//!
//! One monitor task is spawned per monitored process; each blocks on its
//! child's exit and pushes a completion event onto a shared queue. The
//! loop consumes events serially on a single task, so restart decisions
//! never overlap - not across names, and not for successive incarnations
//! of the same name, because a relaunch is only spawned after the prior
//! event has been fully handled.
//!
//! Decision per event:
//! - non-zero exit: the process crashed; it is removed for good and the
//!   restart-intent flag is never consulted. A crash must not be
//!   amplified into a restart loop without operator intervention.
//! - zero exit: the flag is read once, immediately. `true` relaunches
//!   the same descriptor (no log re-rotation, no pid re-record); `false`
//!   or absent is a deliberate, permanent stop.
//!
//! The loop returns once no monitored process remains active. With
//! nothing monitored it returns without blocking at all.

use chrono::{DateTime, Utc};
use mudhost_common::{ProcessName, RunnerResult};
use mudhost_runfiles::{rotate_log, IntentStore, PidRegistry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::launcher;
use crate::spec::ManagedProcessSpec;

/// Exit code reported through the completion queue when a child could
/// not be spawned, was killed by a signal, or could not be awaited.
pub const SYNTHETIC_FAILURE_CODE: i32 = -1;

/// Termination notice for one incarnation of a monitored process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    pub name: ProcessName,
    pub exit_code: i32,
}

/// Final per-process accounting returned by the loop.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub name: ProcessName,
    /// Exit code of the final incarnation.
    pub exit_code: i32,
    /// How many times the process was relaunched after a clean exit.
    pub relaunch_count: u32,
    pub last_launch: Option<DateTime<Utc>>,
}

/// Accounting for a whole supervisor run.
#[derive(Debug, Clone, Default)]
pub struct SupervisorReport {
    pub outcomes: Vec<ProcessOutcome>,
}

impl SupervisorReport {
    pub fn outcome(&self, name: ProcessName) -> Option<&ProcessOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Requests every monitor task to kill its child, which drains the loop
/// through the normal completion path. The loop's contract is unchanged
/// when the handle is never used; the bin wires it to SIGINT/SIGTERM.
#[derive(Clone)]
pub struct CancelHandle {
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

#[derive(Debug, Default)]
struct MonitorTracking {
    relaunch_count: u32,
    last_launch: Option<DateTime<Utc>>,
    last_exit: Option<i32>,
}

/// The supervisor: owns the completion queue, the set of active
/// monitored names, and the launch descriptors needed to relaunch.
pub struct Supervisor {
    intent_store: Arc<dyn IntentStore>,
    registry: PidRegistry,
    specs: HashMap<ProcessName, ManagedProcessSpec>,
    active: HashSet<ProcessName>,
    tracking: HashMap<ProcessName, MonitorTracking>,
    events_tx: mpsc::Sender<CompletionEvent>,
    events_rx: mpsc::Receiver<CompletionEvent>,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl Supervisor {
    pub fn new(intent_store: Arc<dyn IntentStore>, registry: PidRegistry) -> Self {
        let (events_tx, events_rx) = mpsc::channel(16);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            intent_store,
            registry,
            specs: HashMap::new(),
            active: HashSet::new(),
            tracking: HashMap::new(),
            events_tx,
            events_rx,
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    /// Handle for requesting cancellation from outside the loop.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancel_tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Number of monitored processes still active.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// First launch of a monitored process: rotate its log, initialize
    /// the restart intent to `true`, spawn the monitor task and record
    /// the pid. Neither rotation nor pid recording happen again for
    /// relaunches within this runner invocation.
    ///
    /// A failed intent write is reported but does not prevent the
    /// launch; the process simply loses the ability to request a
    /// relaunch and falls back to do-not-relaunch semantics.
    pub async fn start_monitored(&mut self, spec: ManagedProcessSpec) {
        debug_assert!(spec.monitored);

        if let Err(e) = rotate_log(&spec.log_file).await {
            warn!("Could not rotate log for {}: {}", spec.name, e);
        }
        if let Err(e) = self.intent_store.set_intent(spec.name, true).await {
            error!(
                "Could not persist restart intent for {}: {}; it will not be relaunched on reload",
                spec.name, e
            );
        }

        self.active.insert(spec.name);
        self.tracking.insert(
            spec.name,
            MonitorTracking {
                relaunch_count: 0,
                last_launch: Some(Utc::now()),
                last_exit: None,
            },
        );
        self.specs.insert(spec.name, spec.clone());
        self.spawn_monitor(spec, true);
    }

    /// Launch a detached daemon: rotate its log, set its restart intent
    /// to `false` (a daemon's clean exit is always final), spawn it and
    /// record the pid. The supervisor never observes it again.
    pub async fn start_detached(&self, spec: ManagedProcessSpec) -> RunnerResult<()> {
        debug_assert!(!spec.monitored);

        if let Err(e) = rotate_log(&spec.log_file).await {
            warn!("Could not rotate log for {}: {}", spec.name, e);
        }
        if let Err(e) = self.intent_store.set_intent(spec.name, false).await {
            warn!("Could not persist restart intent for {}: {}", spec.name, e);
        }

        let child = launcher::spawn_child(&spec)?;
        if let Some(pid) = child.id() {
            info!("{} running as daemon process {}", spec.name.display_name(), pid);
            debug!("{} command line: {}", spec.name, spec.command_line());
            if let Err(e) = self.registry.record_pid(spec.name, pid).await {
                warn!("Could not record pid for {}: {}", spec.name, e);
            }
        }
        // Dropping the handle leaves the daemon running untracked.
        drop(child);
        Ok(())
    }

    fn spawn_monitor(&self, spec: ManagedProcessSpec, first_launch: bool) {
        let events_tx = self.events_tx.clone();
        let registry = first_launch.then(|| self.registry.clone());
        let mut cancel_rx = self.cancel_tx.subscribe();

        tokio::spawn(async move {
            let exit_code = monitor_process(&spec, registry, &mut cancel_rx).await;
            if events_tx
                .send(CompletionEvent {
                    name: spec.name,
                    exit_code,
                })
                .await
                .is_err()
            {
                debug!("Supervisor loop gone before {} completion", spec.name);
            }
        });
    }

    /// Consume completion events until no monitored process remains
    /// active, then return the per-process accounting. Returns without
    /// blocking when nothing is monitored.
    pub async fn run(mut self) -> SupervisorReport {
        if self.active.is_empty() {
            info!("No monitored processes; nothing to wait on");
            return self.report();
        }

        while let Some(event) = self.events_rx.recv().await {
            self.handle_completion(event).await;
            if self.active.is_empty() {
                break;
            }
        }

        self.report()
    }

    async fn handle_completion(&mut self, event: CompletionEvent) {
        let CompletionEvent { name, exit_code } = event;
        if let Some(tracking) = self.tracking.get_mut(&name) {
            tracking.last_exit = Some(exit_code);
        }

        if exit_code != 0 {
            // Crashes always stop, whatever the intent flag says.
            warn!(
                "{} exited with code {}; it will not be relaunched",
                name.display_name(),
                exit_code
            );
            self.active.remove(&name);
            return;
        }

        // Clean exit: read the intent once, immediately, so a value
        // written later by the next incarnation cannot leak into this
        // decision.
        let relaunch = match self.intent_store.get_intent(name).await {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Could not read restart intent for {}: {}; treating as stop",
                    name, e
                );
                false
            }
        };

        if relaunch {
            info!("{} stopped cleanly. Restarting ...", name.display_name());
            let spec = match self.specs.get(&name) {
                Some(spec) => spec.clone(),
                None => {
                    error!("No launch descriptor retained for {}", name);
                    self.active.remove(&name);
                    return;
                }
            };
            if let Some(tracking) = self.tracking.get_mut(&name) {
                tracking.relaunch_count += 1;
                tracking.last_launch = Some(Utc::now());
            }
            self.spawn_monitor(spec, false);
        } else {
            info!("{} stopped.", name.display_name());
            self.active.remove(&name);
        }
    }

    fn report(&self) -> SupervisorReport {
        let mut outcomes: Vec<ProcessOutcome> = self
            .tracking
            .iter()
            .map(|(name, tracking)| ProcessOutcome {
                name: *name,
                exit_code: tracking.last_exit.unwrap_or(0),
                relaunch_count: tracking.relaunch_count,
                last_launch: tracking.last_launch,
            })
            .collect();
        outcomes.sort_by_key(|o| o.name.as_str());
        SupervisorReport { outcomes }
    }
}

/// Launch one incarnation and block until it terminates, reducing every
/// failure mode to an exit code. Spawn failures never cross the task
/// boundary as errors; they surface as a synthetic non-zero completion
/// through the same queue as ordinary exits.
async fn monitor_process(
    spec: &ManagedProcessSpec,
    registry: Option<PidRegistry>,
    cancel_rx: &mut watch::Receiver<bool>,
) -> i32 {
    let mut child = match launcher::spawn_child(spec) {
        Ok(child) => child,
        Err(e) => {
            error!("{}", e);
            return SYNTHETIC_FAILURE_CODE;
        }
    };

    if let Some(pid) = child.id() {
        info!("{} running as process {}", spec.name.display_name(), pid);
        debug!("{} command line: {}", spec.name, spec.command_line());
        if let Some(registry) = registry {
            if let Err(e) = registry.record_pid(spec.name, pid).await {
                warn!("Could not record pid for {}: {}", spec.name, e);
            }
        }
    }

    // `wait_for` rather than `changed`: a monitor spawned for a relaunch
    // subscribes after the cancel value may already be `true`, and
    // `subscribe()` marks the current value as seen. `wait_for` fires
    // immediately in that case instead of blocking on the next send.
    let status = tokio::select! {
        status = child.wait() => status,
        _ = async {
            // Drop the non-Send watch guard before the branch body runs
            // so the future stays Send across `child.kill().await`.
            let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
        } => {
            info!("Cancellation requested; killing {}", spec.name.display_name());
            if let Err(e) = child.kill().await {
                warn!("Could not kill {}: {}", spec.name, e);
            }
            return SYNTHETIC_FAILURE_CODE;
        }
    };

    match status {
        // Killed by signal yields no code; treat it as a crash.
        Ok(status) => status.code().unwrap_or(SYNTHETIC_FAILURE_CODE),
        Err(e) => {
            error!("Could not await {}: {}", spec.name, e);
            SYNTHETIC_FAILURE_CODE
        }
    }
}
