//! External tool invocation.
//!
//! Converters never touch `std::process` directly. They describe the command
//! they want as a [`ProcessTemplate`] and hand it to a [`ProcessLauncher`],
//! which blocks the calling thread until the tool exits, the deadline passes,
//! or the caller cancels. Launching is a blocking operation: run it from a
//! worker (see [`crate::tasks`]), never from a thread that must stay
//! responsive.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::error::ProcessError;

/// Default timeout for external tools (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for stderr after the child exits. A background process
/// that inherited the pipe can hold it open indefinitely.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Cooperative cancellation token shared between a caller and a running
/// invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Any invocation observing this token kills its
    /// child process on the next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call limits supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Deadline for the external tool. `None` uses the launcher default.
    pub timeout: Option<Duration>,
    /// Cancellation token checked while waiting.
    pub cancel: Option<CancelFlag>,
}

impl InvokeOptions {
    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the cancellation token.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTemplate {
    /// Tool or interpreter to execute.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// Working directory, if the tool needs one.
    pub working_dir: Option<PathBuf>,
}

impl ProcessTemplate {
    /// Creates a template with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Human-readable command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Result of a tool that ran to a successful exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code reported by the OS.
    pub exit_code: i32,
    /// Captured stderr.
    pub stderr: String,
    /// Wall-clock time from spawn to exit.
    pub duration: Duration,
}

/// Launches an external process and waits for it.
pub trait ProcessLauncher: Send + Sync {
    /// Runs `template` to completion under `options`.
    ///
    /// A non-zero exit is returned as [`ProcessError::NonZeroExit`].
    fn launch(
        &self,
        template: &ProcessTemplate,
        options: &InvokeOptions,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessLauncher`] backed by `std::process`.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    default_timeout: Duration,
}

impl SystemLauncher {
    /// Creates a launcher with the default timeout.
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the timeout used when the caller does not supply one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Returns the timeout used when the caller does not supply one.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher for SystemLauncher {
    fn launch(
        &self,
        template: &ProcessTemplate,
        options: &InvokeOptions,
    ) -> Result<ProcessOutput, ProcessError> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        let mut cmd = template.to_command();
        // Only stderr is surfaced; stdout stays unpiped so a chatty tool
        // cannot fill a pipe nobody reads.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!(command = %template.command_line(), "launching external tool");

        let start = Instant::now();
        let child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            program: template.program.clone(),
            source,
        })?;

        let mut guard = ChildGuard::new(child);
        let stderr_rx = guard.drain_stderr();
        // A deadline past the end of the clock means no deadline.
        let deadline = start.checked_add(timeout);
        let status = guard.wait_until(deadline, timeout, options)?;
        let duration = start.elapsed();

        let stderr = match stderr_rx {
            Some(rx) => rx.recv_timeout(STDERR_GRACE).unwrap_or_else(|_| {
                tracing::debug!(
                    command = %template.command_line(),
                    "stderr still open after exit, not waiting for it"
                );
                String::new()
            }),
            None => String::new(),
        };

        if !status.success() {
            return Err(ProcessError::NonZeroExit {
                exit_code: status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(ProcessOutput {
            exit_code: status.code().unwrap_or(0),
            stderr,
            duration,
        })
    }
}

/// Owns a child process and guarantees it is killed and reaped on every exit
/// path, including unwinding.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn drain_stderr(&mut self) -> Option<Receiver<String>> {
        let mut pipe = self.child.stderr.take()?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        Some(rx)
    }

    fn wait_until(
        &mut self,
        deadline: Option<Instant>,
        timeout: Duration,
        options: &InvokeOptions,
    ) -> Result<ExitStatus, ProcessError> {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.reaped = true;
                    return Ok(status);
                }
                Ok(None) => {
                    if options.is_cancelled() {
                        self.kill();
                        return Err(ProcessError::Cancelled);
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        self.kill();
                        return Err(ProcessError::Timeout {
                            timeout_secs: timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(ProcessError::WaitFailed(e)),
            }
        }
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill();
        }
    }
}

/// Resolves `path` against the current directory without touching the
/// filesystem. Tools launched with a working directory need absolute paths.
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> ProcessTemplate {
        if cfg!(windows) {
            ProcessTemplate::new("cmd").args(["/C", script])
        } else {
            ProcessTemplate::new("sh").args(["-c", script])
        }
    }

    #[test]
    fn test_template_builder() {
        let template = ProcessTemplate::new("/usr/bin/python3")
            .args(["-O", "-m", "enjarify.main"])
            .arg("in.apk")
            .working_dir("/opt/enjarify");

        assert_eq!(template.args.len(), 4);
        assert_eq!(template.working_dir, Some(PathBuf::from("/opt/enjarify")));
        assert_eq!(
            template.command_line(),
            "/usr/bin/python3 -O -m enjarify.main in.apk"
        );
    }

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_launch_captures_stderr() {
        let launcher = SystemLauncher::new();
        let output = launcher
            .launch(&shell("echo hello 1>&2"), &InvokeOptions::default())
            .unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stderr.to_lowercase().contains("hello"));
    }

    #[test]
    fn test_launch_reports_non_zero_exit() {
        let launcher = SystemLauncher::new();
        let err = launcher
            .launch(&shell("echo broken 1>&2 && exit 3"), &InvokeOptions::default())
            .unwrap_err();
        match err {
            ProcessError::NonZeroExit { exit_code, stderr } => {
                assert_eq!(exit_code, 3);
                assert!(stderr.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_launch_missing_program() {
        let launcher = SystemLauncher::new();
        let template = ProcessTemplate::new("/definitely/not/a/real/tool");
        let err = launcher
            .launch(&template, &InvokeOptions::default())
            .unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_times_out() {
        let launcher = SystemLauncher::new();
        let options = InvokeOptions::default().with_timeout(Duration::from_millis(200));
        let start = Instant::now();
        let err = launcher.launch(&shell("sleep 5"), &options).unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_default_timeout_applies() {
        let launcher = SystemLauncher::new().with_default_timeout(Duration::from_millis(200));
        let err = launcher
            .launch(&shell("sleep 5"), &InvokeOptions::default())
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_cancelled() {
        let launcher = SystemLauncher::new();
        let cancel = CancelFlag::new();
        let options = InvokeOptions::default().with_cancel(cancel.clone());

        let trigger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            cancel.cancel();
        });

        let err = launcher.launch(&shell("sleep 5"), &options).unwrap_err();
        trigger.join().unwrap();
        assert!(matches!(err, ProcessError::Cancelled));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_honours_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let template = shell("pwd 1>&2").working_dir(dir.path());
        let output = SystemLauncher::new()
            .launch(&template, &InvokeOptions::default())
            .unwrap();
        let reported = PathBuf::from(output.stderr.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_launch_with_unbounded_timeout() {
        let launcher = SystemLauncher::new();
        let output = launcher
            .launch(
                &shell("exit 0"),
                &InvokeOptions::default().with_timeout(Duration::MAX),
            )
            .unwrap();
        assert_eq!(output.exit_code, 0);

        let launcher = SystemLauncher::new().with_default_timeout(Duration::from_secs(u64::MAX));
        assert!(launcher
            .launch(&shell("exit 0"), &InvokeOptions::default())
            .is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_returns_while_background_child_holds_stderr() {
        let launcher = SystemLauncher::new();
        let options = InvokeOptions::default().with_timeout(Duration::from_millis(500));
        let start = Instant::now();
        let output = launcher
            .launch(&shell("sleep 6 & exit 0"), &options)
            .unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "launch waited {:?} for a background process",
            start.elapsed()
        );
    }

    #[test]
    fn test_absolute_path() {
        let path = absolute_path(Path::new("classes.dex"));
        assert!(path.is_absolute());
        assert!(path.ends_with("classes.dex"));
    }
}
