//! Child processes that cannot outlive the scope that spawned them.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MIN_POLL: Duration = Duration::from_millis(5);
const MAX_POLL: Duration = Duration::from_millis(100);

/// How a child process finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited(i32),
    /// Terminated by a signal before producing an exit code.
    Signaled,
    TimedOut(Duration),
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ProcessOutcome::Exited(0))
    }

    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ProcessOutcome::Exited(code),
            None => ProcessOutcome::Signaled,
        }
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Exited(code) => write!(f, "exit status {code}"),
            ProcessOutcome::Signaled => f.write_str("terminated by signal"),
            ProcessOutcome::TimedOut(limit) => {
                write!(f, "timed out after {:.1}s", limit.as_secs_f64())
            }
        }
    }
}

/// Process groups of children that have been spawned but not yet reaped.
struct LiveGroups {
    interrupted: bool,
    leaders: Vec<u32>,
}

static LIVE_GROUPS: Mutex<LiveGroups> = Mutex::new(LiveGroups {
    interrupted: false,
    leaders: Vec::new(),
});

fn live_groups() -> MutexGuard<'static, LiveGroups> {
    LIVE_GROUPS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Kill every live child group and refuse further spawns. Meant for a
/// termination signal handler; returns the number of groups signalled.
pub fn interrupt_live_groups() -> usize {
    let mut live = live_groups();
    live.interrupted = true;
    for &leader in &live.leaders {
        kill_group(leader);
    }
    live.leaders.len()
}

fn release_group(leader: u32) {
    live_groups().leaders.retain(|&pid| pid != leader);
}

#[cfg(unix)]
fn kill_group(leader: u32) {
    // SAFETY: killpg only sends a signal; an empty group yields ESRCH.
    unsafe {
        libc::killpg(leader as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_leader: u32) {}

/// Owns a running child. Dropping it kills the child (and, on Unix, its
/// whole process group) if it has not been reaped yet.
pub struct ScopedProcess {
    child: Option<Child>,
    leader: u32,
    label: String,
}

impl ScopedProcess {
    /// Spawn `command` with stdout redirected into `stdout_log`, which is
    /// created or truncated first.
    pub fn spawn(mut command: Command, stdout_log: &Path, label: impl Into<String>) -> io::Result<Self> {
        let label = label.into();
        let log = File::create(stdout_log)?;
        command.stdin(Stdio::null()).stdout(Stdio::from(log));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        // Held across spawn so an interrupt cannot miss a fresh group.
        let mut live = live_groups();
        if live.interrupted {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "sweep interrupted"));
        }
        let child = command.spawn()?;
        let leader = child.id();
        live.leaders.push(leader);
        drop(live);

        debug!(label = %label, pid = leader, log = %stdout_log.display(), "spawned child process");
        Ok(Self {
            child: Some(child),
            leader,
            label,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Block until the child exits or `timeout` elapses. `None` waits forever.
    /// Whatever is left of the child's group afterwards is killed.
    pub fn wait(mut self, timeout: Option<Duration>) -> io::Result<ProcessOutcome> {
        let Some(child) = self.child.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "process already reaped"));
        };

        let outcome = match timeout {
            None => ProcessOutcome::from_status(child.wait()?),
            Some(limit) => {
                let deadline = Instant::now() + limit;
                let mut poll = MIN_POLL;
                loop {
                    if let Some(status) = child.try_wait()? {
                        break ProcessOutcome::from_status(status);
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(label = %self.label, ?limit, "child process timed out; terminating");
                        self.terminate();
                        break ProcessOutcome::TimedOut(limit);
                    }
                    thread::sleep(poll.min(deadline - now));
                    poll = (poll * 2).min(MAX_POLL);
                }
            }
        };

        if self.child.take().is_some() {
            kill_group(self.leader);
            release_group(self.leader);
        }
        debug!(label = %self.label, %outcome, "child process finished");
        Ok(outcome)
    }

    fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        // The child leads its own group, so its pid is the group id.
        kill_group(self.leader);
        let _ = child.kill();
        let _ = child.wait();
        release_group(self.leader);
    }
}

impl Drop for ScopedProcess {
    fn drop(&mut self) {
        if self.child.is_some() {
            debug!(label = %self.label, "dropping live child process");
            self.terminate();
        }
    }
}

/// Spawn, wait with a bound, and report how the process ended.
pub fn run_logged(
    command: Command,
    stdout_log: &Path,
    label: &str,
    timeout: Option<Duration>,
) -> io::Result<ProcessOutcome> {
    ScopedProcess::spawn(command, stdout_log, label)?.wait(timeout)
}
