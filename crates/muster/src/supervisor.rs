//! Process supervision: detach, restart, bound log growth.
//!
//! A supervised command is kept alive by a small loop that runs in its own
//! session, detached from whatever launched it, so it survives the exit of
//! the bootstrap process. Each iteration probes liveness, restarts the
//! command if it is gone, and truncates the log once it crosses the ceiling.
//! Coarse rotation: no backup copy is kept, history is traded for bounded
//! disk use.
//!
//! Two independent instances of this pattern run concurrently on a node
//! (agent keep-alive and credential re-assert); they share no state.
//!
//! NOTE: Detachment and the /proc liveness probe are Unix-specific. Non-Unix
//! builds log a debug line and report "not running", mirroring the stub
//! pattern used elsewhere in the workspace.

use muster_common::MusterError;
use muster_common::constants::{DEFAULT_LOG_CEILING_BYTES, SUPERVISOR_POLL_SECS};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the supervisor decides whether the managed activity is alive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessProbe {
    /// Alive iff some other process's command line contains this pattern
    Pattern(String),
    /// Alive iff running `command` yields output containing `needle`.
    /// Used to re-assert state that is not itself a process, such as a
    /// companion service's admin credential.
    Check { command: Vec<String>, needle: String },
}

impl ProcessProbe {
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Pattern(pattern) => process_matching(pattern),
            Self::Check { command, needle } => {
                let Some((program, args)) = command.split_first() else {
                    return false;
                };
                match Command::new(program).args(args).output() {
                    Ok(output) => String::from_utf8_lossy(&output.stdout).contains(needle),
                    Err(e) => {
                        debug!(error = %e, "Probe command failed to run");
                        false
                    }
                }
            }
        }
    }
}

/// Everything needed to keep one command alive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSpec {
    /// The managed command line (program plus arguments)
    pub command: Vec<String>,

    /// Where the managed process's stdout/stderr go; `None` is the quiet
    /// variant (null sink)
    pub log_path: Option<PathBuf>,

    /// Truncate the log to empty once it exceeds this many bytes
    pub log_ceiling_bytes: u64,

    /// Liveness probe evaluated each iteration
    pub probe: ProcessProbe,

    /// Sleep between iterations
    pub interval: Duration,

    /// Working directory for the managed command, if it matters
    pub work_dir: Option<PathBuf>,
}

impl SupervisorSpec {
    pub fn new(command: Vec<String>, log_path: Option<PathBuf>, probe: ProcessProbe) -> Self {
        Self {
            command,
            log_path,
            log_ceiling_bytes: DEFAULT_LOG_CEILING_BYTES,
            probe,
            interval: Duration::from_secs(SUPERVISOR_POLL_SECS),
            work_dir: None,
        }
    }

    /// Serialize this spec into arguments for the hidden `supervise`
    /// subcommand. Inverse of the clap parsing in `main.rs`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["supervise".to_string()];
        if let Some(path) = &self.log_path {
            args.push("--log-path".into());
            args.push(path.display().to_string());
        }
        args.push("--log-ceiling".into());
        args.push(self.log_ceiling_bytes.to_string());
        args.push("--interval-ms".into());
        args.push(self.interval.as_millis().to_string());
        if let Some(dir) = &self.work_dir {
            args.push("--work-dir".into());
            args.push(dir.display().to_string());
        }
        match &self.probe {
            ProcessProbe::Pattern(pattern) => {
                args.push("--probe-pattern".into());
                args.push(pattern.clone());
            }
            ProcessProbe::Check { command, needle } => {
                // One flag occurrence per argument, so arguments containing
                // whitespace survive the re-exec round trip
                for part in command {
                    args.push("--probe-check".into());
                    args.push(part.clone());
                }
                args.push("--probe-needle".into());
                args.push(needle.clone());
            }
        }
        args.push("--".into());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// Launch the supervision loop as its own detached daemon and return
/// immediately.
///
/// Re-executes the current binary with the `supervise` subcommand in a new
/// session, standard streams discarded, so the loop does not depend on any
/// parent process remaining alive.
pub fn spawn_detached(spec: &SupervisorSpec) -> Result<(), MusterError> {
    let exe = std::env::current_exe()
        .map_err(|e| MusterError::Supervisor(format!("current_exe: {e}")))?;

    let mut command = Command::new(exe);
    command
        .args(spec.to_args())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    detach(&mut command);

    let child = command
        .spawn()
        .map_err(|e| MusterError::Supervisor(format!("spawn supervisor: {e}")))?;

    info!(
        pid = child.id(),
        command = ?spec.command,
        "Supervisor daemon detached"
    );
    reap_in_background(child);
    Ok(())
}

/// The supervision loop itself. Runs forever.
pub fn run_loop(spec: &SupervisorSpec) -> ! {
    info!(command = ?spec.command, interval = ?spec.interval, "Supervision loop started");
    loop {
        tick(spec);
        std::thread::sleep(spec.interval);
    }
}

/// One supervision iteration: restart if dead, truncate an oversized log.
/// Failures are logged and absorbed; the loop never stops.
pub fn tick(spec: &SupervisorSpec) {
    if !spec.probe.is_alive() {
        warn!(command = ?spec.command, "Managed process not running, starting");
        if let Err(e) = start_managed(spec) {
            warn!(error = %e, "Failed to start managed process");
        }
    }

    if let Some(log_path) = &spec.log_path {
        match std::fs::metadata(log_path) {
            Ok(meta) if meta.len() > spec.log_ceiling_bytes => {
                info!(log = %log_path.display(), size = meta.len(), "Truncating oversized log");
                if let Err(e) = File::create(log_path) {
                    warn!(error = %e, "Log truncation failed");
                }
            }
            _ => {}
        }
    }
}

/// Start one detached instance of the managed command without waiting for it
fn start_managed(spec: &SupervisorSpec) -> Result<(), MusterError> {
    let (program, args) = spec
        .command
        .split_first()
        .ok_or_else(|| MusterError::Supervisor("empty managed command".into()))?;

    let (stdout, stderr) = match &spec.log_path {
        Some(path) => {
            let log = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| MusterError::Supervisor(format!("open {}: {e}", path.display())))?;
            let err = log
                .try_clone()
                .map_err(|e| MusterError::Supervisor(format!("clone log handle: {e}")))?;
            (Stdio::from(log), Stdio::from(err))
        }
        None => (Stdio::null(), Stdio::null()),
    };

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).stdout(stdout).stderr(stderr);
    if let Some(dir) = &spec.work_dir {
        command.current_dir(dir);
    }
    detach(&mut command);

    let child = command
        .spawn()
        .map_err(|e| MusterError::Supervisor(format!("spawn {program}: {e}")))?;

    debug!(pid = child.id(), program, "Managed process started");
    reap_in_background(child);
    Ok(())
}

/// Collect the exit status off-thread so restarted children never linger as
/// zombies
fn reap_in_background(mut child: std::process::Child) {
    std::thread::spawn(move || {
        let _ = child.wait();
    });
}

/// Put the child in a new process group so it survives its launcher (Unix)
#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn detach(_command: &mut Command) {
    debug!("Process detachment not available on this platform");
}

/// Scan /proc for any other process whose command line contains `pattern`.
/// Our own process is excluded: the supervise subcommand carries the managed
/// command line in its own arguments.
#[cfg(target_os = "linux")]
fn process_matching(pattern: &str) -> bool {
    let own_pid = std::process::id().to_string();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return false;
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str() else { continue };
        if !pid.bytes().all(|b| b.is_ascii_digit()) || pid == own_pid {
            continue;
        }
        let Ok(raw) = std::fs::read(entry.path().join("cmdline")) else {
            continue;
        };
        let cmdline = raw
            .split(|b| *b == 0)
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>()
            .join(" ");
        if cmdline.contains(pattern) {
            return true;
        }
    }
    false
}

#[cfg(not(target_os = "linux"))]
fn process_matching(_pattern: &str) -> bool {
    debug!("Command-line liveness probe not available on this platform");
    false
}
