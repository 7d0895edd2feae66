//! External command execution.
//!
//! Camera capture, face detection and speech synthesis all shell out to
//! system tools. The `CommandExecutor` trait keeps them testable without
//! those tools installed.

use crate::error::{KioskError, Result};
use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failure(status: i32, stderr: &str) -> Self {
        Self {
            status: Some(status),
            stdout: Vec::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }
}

/// A long-running command started with [`CommandExecutor::spawn`].
pub trait ChildProcess: Send {
    /// Take the child's stdout. Returns `None` after the first call.
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Kill the child and reap it.
    fn terminate(&mut self);
}

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion.
    ///
    /// Only failures to launch are errors; a non-zero exit is reported
    /// through [`CommandOutput::status`].
    fn run(&self, command: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command and return its stdout, failing on a non-zero exit.
    fn execute(&self, command: &str, args: &[&str]) -> Result<Vec<u8>> {
        let output = self.run(command, args)?;
        if !output.is_success() {
            return Err(KioskError::CommandFailed {
                message: format!(
                    "{} failed with status {:?}: {}",
                    command,
                    output.status,
                    output.stderr.trim()
                ),
            });
        }
        Ok(output.stdout)
    }

    /// Start a command that keeps running, with its stdout piped.
    fn spawn(&self, command: &str, args: &[&str]) -> Result<Box<dyn ChildProcess>>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, command: &str, args: &[&str]) -> Result<CommandOutput> {
        tracing::trace!(command, ?args, "running command");
        let output = Command::new(command)
            .args(args)
            .output()
            .map_err(|e| launch_error(command, e))?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn spawn(&self, command: &str, args: &[&str]) -> Result<Box<dyn ChildProcess>> {
        tracing::debug!(command, ?args, "spawning command");
        let child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| launch_error(command, e))?;
        Ok(Box::new(SystemChild(child)))
    }
}

fn launch_error(command: &str, e: std::io::Error) -> KioskError {
    if e.kind() == std::io::ErrorKind::NotFound {
        KioskError::CommandNotFound {
            command: command.to_string(),
        }
    } else {
        KioskError::CommandFailed {
            message: format!("Failed to execute {}: {}", command, e),
        }
    }
}

struct SystemChild(Child);

impl ChildProcess for SystemChild {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.0
            .stdout
            .take()
            .map(|out| Box::new(out) as Box<dyn Read + Send>)
    }

    fn terminate(&mut self) {
        if let Err(e) = self.0.kill() {
            // Already exited.
            tracing::debug!(pid = self.0.id(), error = %e, "kill failed");
        }
        if let Err(e) = self.0.wait() {
            tracing::warn!(pid = self.0.id(), error = %e, "failed to reap child");
        }
    }
}

type Responses = HashMap<String, VecDeque<Result<CommandOutput>>>;

/// Mock command executor for testing.
///
/// Responses are queued per command name. Clones share the queue and the
/// call log, so a test can keep a handle after moving the mock into a
/// component. Unscripted commands fail with `CommandNotFound`.
///
/// Spawned commands replay their scripted stdout in a loop until
/// terminated.
#[derive(Debug, Clone, Default)]
pub struct MockCommandExecutor {
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    responses: Arc<Mutex<Responses>>,
    streams: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    terminations: Arc<AtomicUsize>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next run of `command`.
    pub fn with_output(self, command: &str, output: CommandOutput) -> Self {
        self.push(command, Ok(output));
        self
    }

    /// Queue an error for the next run of `command`.
    pub fn with_error(self, command: &str, error: KioskError) -> Self {
        self.push(command, Err(error));
        self
    }

    /// Script the stdout a spawned `command` repeats until terminated.
    pub fn with_stream(self, command: &str, stdout: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut streams) = self.streams.lock() {
            streams.insert(command.to_string(), stdout.into());
        }
        self
    }

    fn push(&self, command: &str, response: Result<CommandOutput>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry(command.to_string())
                .or_default()
                .push_back(response);
        }
    }

    /// Every command run so far, with its arguments.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// How many spawned children have been terminated.
    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    fn record(&self, command: &str, args: &[&str]) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((
                command.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            ));
        }
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn run(&self, command: &str, args: &[&str]) -> Result<CommandOutput> {
        self.record(command, args);
        self.responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.get_mut(command)?.pop_front())
            .unwrap_or_else(|| {
                Err(KioskError::CommandNotFound {
                    command: command.to_string(),
                })
            })
    }

    fn spawn(&self, command: &str, args: &[&str]) -> Result<Box<dyn ChildProcess>> {
        self.record(command, args);
        let data = self
            .streams
            .lock()
            .ok()
            .and_then(|streams| streams.get(command).cloned())
            .ok_or_else(|| KioskError::CommandNotFound {
                command: command.to_string(),
            })?;
        let killed = Arc::new(AtomicBool::new(false));
        Ok(Box::new(MockChild {
            stdout: Some(RepeatingReader {
                data,
                pos: 0,
                killed: Arc::clone(&killed),
            }),
            killed,
            terminations: Arc::clone(&self.terminations),
        }))
    }
}

struct MockChild {
    stdout: Option<RepeatingReader>,
    killed: Arc<AtomicBool>,
    terminations: Arc<AtomicUsize>,
}

impl ChildProcess for MockChild {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout
            .take()
            .map(|out| Box::new(out) as Box<dyn Read + Send>)
    }

    fn terminate(&mut self) {
        if !self.killed.swap(true, Ordering::SeqCst) {
            self.terminations.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Cycles through `data` forever; reads hit end of file once killed.
struct RepeatingReader {
    data: Vec<u8>,
    pos: usize,
    killed: Arc<AtomicBool>,
}

impl Read for RepeatingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.data.is_empty() || buf.is_empty() || self.killed.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos = (self.pos + n) % self.data.len();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_returns_stdout_on_success() {
        let executor =
            MockCommandExecutor::new().with_output("echo", CommandOutput::success("hi\n"));

        assert_eq!(executor.execute("echo", &["hi"]).unwrap(), b"hi\n");
        assert_eq!(
            executor.calls(),
            vec![("echo".to_string(), vec!["hi".to_string()])]
        );
    }

    #[test]
    fn test_execute_fails_on_nonzero_status() {
        let executor = MockCommandExecutor::new()
            .with_output("ffmpeg", CommandOutput::failure(1, "No such device\n"));

        match executor.execute("ffmpeg", &[]) {
            Err(KioskError::CommandFailed { message }) => {
                assert!(message.contains("ffmpeg"));
                assert!(message.contains("No such device"));
            }
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_run_reports_nonzero_status_without_error() {
        let executor = MockCommandExecutor::new()
            .with_output("facedetect", CommandOutput::failure(2, ""));

        let output = executor.run("facedetect", &["img.ppm"]).unwrap();
        assert_eq!(output.status, Some(2));
        assert!(!output.is_success());
    }

    #[test]
    fn test_mock_unscripted_command_is_not_found() {
        let executor = MockCommandExecutor::new();

        match executor.run("espeak-ng", &["hello"]) {
            Err(KioskError::CommandNotFound { command }) => assert_eq!(command, "espeak-ng"),
            other => panic!("Expected CommandNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_mock_clones_share_call_log() {
        let executor = MockCommandExecutor::new().with_output("say", CommandOutput::success(""));
        let handle = executor.clone();

        executor.run("say", &["hello"]).unwrap();

        assert_eq!(handle.calls().len(), 1);
    }

    #[test]
    fn test_mock_spawn_repeats_stream_until_terminated() {
        let executor = MockCommandExecutor::new().with_stream("ffmpeg", b"ab".to_vec());

        let mut child = executor.spawn("ffmpeg", &["-i", "cam"]).unwrap();
        let mut stdout = child.take_stdout().unwrap();
        assert!(child.take_stdout().is_none());

        let mut buf = [0u8; 5];
        stdout.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ababa");

        child.terminate();
        child.terminate();
        assert_eq!(stdout.read(&mut buf).unwrap(), 0);
        assert_eq!(executor.terminations(), 1);
        assert_eq!(executor.calls()[0].0, "ffmpeg");
    }

    #[test]
    fn test_mock_spawn_unscripted_is_not_found() {
        let executor = MockCommandExecutor::new();
        assert!(matches!(
            executor.spawn("ffmpeg", &[]),
            Err(KioskError::CommandNotFound { .. })
        ));
    }

    #[test]
    fn test_system_executor_missing_command() {
        let executor = SystemCommandExecutor::new();

        match executor.run("definitely-not-a-real-command-12345", &[]) {
            Err(KioskError::CommandNotFound { command }) => {
                assert_eq!(command, "definitely-not-a-real-command-12345");
            }
            other => panic!("Expected CommandNotFound, got {:?}", other),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_system_executor_captures_stdout_and_status() {
        let executor = SystemCommandExecutor::new();

        let output = executor.run("sh", &["-c", "printf abc; exit 3"]).unwrap();
        assert_eq!(output.stdout, b"abc");
        assert_eq!(output.status, Some(3));
    }

    #[test]
    #[cfg(unix)]
    fn test_system_spawn_streams_until_terminated() {
        let executor = SystemCommandExecutor::new();

        let mut child = executor.spawn("sh", &["-c", "while :; do echo tick; done"]).unwrap();
        let mut stdout = child.take_stdout().unwrap();
        let mut buf = [0u8; 5];
        stdout.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"tick\n");

        child.terminate();
    }
}
