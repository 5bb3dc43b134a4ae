//! External program execution with a bounded run time.
//!
//! Sensor tools and `ipmitool` can hang when a driver or BMC misbehaves.
//! Every invocation goes through [`run_with_timeout`] so a stuck child is
//! killed instead of stalling the control loop.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{FanControlError, Result};
use crate::protocol::mask_credentials;

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, killing it if it outlives `timeout`.
///
/// # Errors
/// - `Spawn` if the program cannot be started
/// - `Timeout` if it does not exit in time
/// - `CommandFailed` if it exits with a non-zero status
pub fn run_with_timeout<S: AsRef<str>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> Result<CommandOutput> {
    let described = describe(program, args);
    trace!("Running: {}", described);

    let mut child = Command::new(program)
        .args(args.iter().map(|a| a.as_ref()))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| FanControlError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Drain pipes on helper threads so a chatty child cannot block on a full pipe.
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(FanControlError::Timeout {
                    command: described,
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(FanControlError::CommandFailed {
                    command: described,
                    reason: e.to_string(),
                });
            }
        }
    };

    let output = CommandOutput {
        stdout: stdout.map(join_reader).unwrap_or_default(),
        stderr: stderr.map(join_reader).unwrap_or_default(),
    };

    if status.success() {
        Ok(output)
    } else {
        let code = status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        Err(FanControlError::CommandFailed {
            command: described,
            reason: format!("exit={} {}", code, output.stderr.trim()),
        })
    }
}

fn describe<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = Vec::with_capacity(args.len() + 1);
    line.push(program);
    line.extend(args.iter().map(|a| a.as_ref()));
    mask_credentials(&line)
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        buf
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
