//! Control change hooks — run user-defined commands on mode/calibration changes.

use std::io;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::control::{CalibrationAxis, DeviceMode, DeviceNotifier};

/// Default timeout for hook commands (30 seconds).
const HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval when waiting for a hook process to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One queued hook invocation.
#[derive(Debug)]
struct HookJob {
    command: String,
    env: Vec<(&'static str, String)>,
}

/// Notifier that runs the configured shell commands.
///
/// Commands are queued to a single worker thread so the notifier never
/// blocks the caller (it runs with the control lock held). Every accepted
/// write runs its hook, one at a time, in the order the writes happened.
/// Empty commands are ignored.
#[derive(Debug, Clone)]
pub struct CommandHooks {
    on_mode: String,
    on_calibration: String,
    timeout: Duration,
    /// Jobs queued or running.
    pending: Arc<AtomicUsize>,
    /// Sender to the worker, spawned on first use.
    worker: Arc<Mutex<Option<Sender<HookJob>>>>,
}

impl CommandHooks {
    pub fn new(on_mode: &str, on_calibration: &str) -> Self {
        CommandHooks {
            on_mode: on_mode.trim().to_string(),
            on_calibration: on_calibration.trim().to_string(),
            timeout: HOOK_TIMEOUT,
            pending: Arc::new(AtomicUsize::new(0)),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.on_mode_command, &config.on_calibration_command)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether neither hook is configured.
    pub fn is_empty(&self) -> bool {
        self.on_mode.is_empty() && self.on_calibration.is_empty()
    }

    /// Whether a hook command is queued or running.
    pub fn is_running(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Block until every queued hook has finished, up to `timeout`.
    /// Returns false if hooks are still pending.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let max_polls = (timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1);
        for _ in 0..max_polls {
            if !self.is_running() {
                return true;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        !self.is_running()
    }

    /// Queue a shell command for the worker thread. Returns false if the
    /// command was empty or could not be queued.
    fn run_hook(&self, command: &str, env: Vec<(&'static str, String)>) -> bool {
        if command.is_empty() {
            return false;
        }
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        let tx = worker.get_or_insert_with(|| spawn_worker(self.timeout, &self.pending));

        self.pending.fetch_add(1, Ordering::SeqCst);
        let job = HookJob {
            command: command.to_string(),
            env,
        };
        if tx.send(job).is_err() {
            // Worker gone; the next hook spawns a new one.
            self.pending.fetch_sub(1, Ordering::SeqCst);
            *worker = None;
            log::warn!("hook worker stopped, dropped: {command}");
            return false;
        }
        true
    }
}

/// Start the worker that runs queued hooks in order. It exits once every
/// sender is dropped.
fn spawn_worker(timeout: Duration, pending: &Arc<AtomicUsize>) -> Sender<HookJob> {
    let (tx, rx) = mpsc::channel::<HookJob>();
    let pending = Arc::clone(pending);
    std::thread::spawn(move || {
        for job in rx {
            match run_hook_with_timeout(&job.command, &job.env, timeout) {
                Ok(s) if !s.success() => {
                    log::warn!("hook command exited with {s}: {}", job.command);
                }
                Err(e) => {
                    log::warn!("hook command failed: {e}: {}", job.command);
                }
                _ => {}
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        }
    });
    tx
}

impl DeviceNotifier for CommandHooks {
    fn mode_changed(&self, mode: DeviceMode) {
        self.run_hook(
            &self.on_mode,
            vec![("GXSHIFT_MODE", mode.token().to_string())],
        );
    }

    fn calibration_changed(&self, axis: CalibrationAxis, armed: bool) {
        self.run_hook(
            &self.on_calibration,
            vec![
                ("GXSHIFT_AXIS", axis.as_str().to_string()),
                ("GXSHIFT_ARMED", u8::from(armed).to_string()),
            ],
        );
    }
}

/// Run a shell command with a timeout. Kills the process if it exceeds the deadline.
fn run_hook_with_timeout(
    command: &str,
    env: &[(&'static str, String)],
    timeout: Duration,
) -> io::Result<ExitStatus> {
    let mut cmd = if cfg!(windows) {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = std::process::Command::new("sh");
        c.args(["-c", command]);
        c
    };
    let mut child = cmd.envs(env.iter().map(|(k, v)| (*k, v.as_str()))).spawn()?;

    let max_polls = (timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1) as u64;
    for _ in 0..max_polls {
        match child.try_wait()? {
            Some(status) => return Ok(status),
            None => std::thread::sleep(POLL_INTERVAL),
        }
    }

    // Timeout — kill and reap
    log::warn!("hook command timed out after {timeout:?}, killing: {command}");
    let _ = child.kill();
    child.wait() // reap zombie
}
