//! Synchronous process execution.
//!
//! Every external tool ubersetup drives (pip, the Python interpreter, a downloaded
//! installer) is described by a [`CommandSpec`] and executed through a
//! [`CommandRunner`]. No shell is involved: the program and its arguments are
//! handed to the OS as-is, so paths with spaces or quotes need no escaping.
//!
//! The child's stdout and stderr are attached to the same pipe and read back as one
//! stream, line by line, on a reader thread while the process runs. The run ends
//! when the child exits, not when the pipe closes: a background process the child
//! left behind may keep the write end open indefinitely.

use crate::libs::errors::{BootstrapError, Result};
use crate::log_debug;
use colored::Colorize;
use std::ffi::OsString;
use std::fmt;
use std::io::{self, BufRead, BufReader, PipeReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Number of trailing output lines quoted in a `CommandFailed` error.
const FAILURE_TAIL_LINES: usize = 5;
/// How often the child is polled for exit while no output arrives.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long output buffered before the child exited may still be collected.
const EXIT_DRAIN_WINDOW: Duration = Duration::from_millis(250);

/// A fully typed command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
    pub env: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>, working_dir: impl AsRef<Path>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.as_ref().to_path_buf(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program name as a lossy string.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Arguments as lossy strings.
    #[cfg(test)]
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of one finished process: exit status plus the merged, trimmed, non-empty
/// output lines in the order they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub lines: Vec<String>,
}

impl CommandOutcome {
    #[cfg(test)]
    pub fn succeeded(lines: Vec<String>) -> Self {
        CommandOutcome {
            code: Some(0),
            success: true,
            lines,
        }
    }

    #[cfg(test)]
    pub fn failed(code: i32, lines: Vec<String>) -> Self {
        CommandOutcome {
            code: Some(code),
            success: false,
            lines,
        }
    }

    /// Turns an unsuccessful outcome into `BootstrapError::CommandFailed`.
    pub fn ensure_success(self, spec: &CommandSpec) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let start = self.lines.len().saturating_sub(FAILURE_TAIL_LINES);
        let tail = if self.lines.is_empty() {
            String::new()
        } else {
            format!(":\n  {}", self.lines[start..].join("\n  "))
        };
        Err(BootstrapError::CommandFailed {
            command: spec.to_string(),
            code: self
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "<signal>".to_string()),
            tail,
        })
    }
}

/// Executes commands. The production implementation is [`SystemCommandRunner`];
/// tests substitute recorders that return canned outcomes.
pub trait CommandRunner {
    /// Runs `spec` to completion. When `suppress_output` is false each captured
    /// line is also echoed to stdout as it arrives.
    fn run(&self, spec: &CommandSpec, suppress_output: bool) -> Result<CommandOutcome>;
}

/// Runs commands on the host with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec, suppress_output: bool) -> Result<CommandOutcome> {
        log_debug!(
            "[Runner] Executing {} in {}",
            spec.to_string().cyan(),
            spec.working_dir.display()
        );

        let (reader, writer) = io::pipe()?;
        let mut child = {
            let mut command = Command::new(&spec.program);
            command
                .args(&spec.args)
                .current_dir(&spec.working_dir)
                .envs(spec.env.iter().map(|(k, v)| (k, v)))
                .stdin(Stdio::null())
                .stdout(writer.try_clone()?)
                .stderr(writer);
            command.spawn().map_err(|e| spawn_error(spec, e))?
            // `command` drops here, closing our copies of the write end so the
            // reader thread sees EOF once every writer is gone.
        };

        let output = spawn_line_reader(reader)?;
        let mut lines = Vec::new();
        let mut collect = |line: io::Result<String>| -> Result<()> {
            let line = line?;
            if !suppress_output {
                println!("{line}");
            }
            lines.push(line);
            Ok(())
        };

        let status = loop {
            match output.recv_timeout(EXIT_POLL_INTERVAL) {
                Ok(line) => collect(line)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break child.wait()?,
            }
            if let Some(status) = child.try_wait()? {
                let deadline = Instant::now() + EXIT_DRAIN_WINDOW;
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match output.recv_timeout(remaining) {
                        Ok(line) => collect(line)?,
                        Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            log_debug!(
                                "[Runner] {} exited but its output is still held open, not waiting for it",
                                spec.program_name().cyan()
                            );
                            break;
                        }
                    }
                }
                break status;
            }
        };

        log_debug!("[Runner] {} exited with {}", spec.program_name().cyan(), status);
        Ok(CommandOutcome {
            code: status.code(),
            success: status.success(),
            lines,
        })
    }
}

/// Reads trimmed, non-empty lines from `reader` on a detached thread until EOF.
fn spawn_line_reader(reader: PipeReader) -> Result<Receiver<io::Result<String>>> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("ubersetup-output".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).trim().to_string();
                        if !line.is_empty() && sender.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = sender.send(Err(e));
                        break;
                    }
                }
            }
        })?;
    Ok(receiver)
}

fn spawn_error(spec: &CommandSpec, err: io::Error) -> BootstrapError {
    if err.kind() == io::ErrorKind::NotFound {
        BootstrapError::ProgramNotFound {
            program: spec.program_name(),
        }
    } else {
        BootstrapError::Io(err)
    }
}
