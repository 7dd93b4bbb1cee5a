//! Contracts for the services transformers rely on but do not own.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::HeliosConfig;
use crate::error::NormalizeError;
use crate::process::{ProcessLauncher, SystemLauncher};

/// Sink for failures that are recovered locally instead of propagated.
pub trait ExceptionReporter: Send + Sync {
    /// Records `error`. Must not panic and must not block for long.
    fn report(&self, error: &(dyn std::error::Error + 'static));
}

/// Renders `error` and its chain of sources as a report a user can paste
/// into an issue.
pub fn format_failure_report(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = String::from(
        "An error occurred while performing this task. Please open an issue with the details below.\n\n",
    );
    let _ = writeln!(
        out,
        "{} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    let _ = writeln!(out, "{}", error);
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = writeln!(out, "  caused by: {}", cause);
        source = cause.source();
    }
    out
}

/// Reporter that logs through `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ExceptionReporter for TracingReporter {
    fn report(&self, error: &(dyn std::error::Error + 'static)) {
        tracing::error!("{}", format_failure_report(error));
    }
}

/// Reporter that keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    reports: Mutex<Vec<String>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far, rendered with [`format_failure_report`].
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ExceptionReporter for MemoryReporter {
    fn report(&self, error: &(dyn std::error::Error + 'static)) {
        self.reports.lock().push(format_failure_report(error));
    }
}

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Background task submission service.
pub trait TaskSubmitter: Send + Sync {
    /// Schedules `task` on a worker context.
    fn submit(&self, task: Task) -> std::io::Result<()>;
}

/// Runs every task on its own named OS thread.
#[derive(Debug)]
pub struct ThreadSubmitter {
    name_prefix: String,
    spawned: AtomicUsize,
}

impl ThreadSubmitter {
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            spawned: AtomicUsize::new(0),
        }
    }
}

impl Default for ThreadSubmitter {
    fn default() -> Self {
        Self::new("helios-worker")
    }
}

impl TaskSubmitter for ThreadSubmitter {
    fn submit(&self, task: Task) -> std::io::Result<()> {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        std::thread::Builder::new()
            .name(format!("{}-{}", self.name_prefix, n))
            .spawn(task)
            .map(|_| ())
    }
}

/// Rewrites a class file with recomputed stack map frames and maxima.
///
/// Implementations come from a bytecode library; this crate only calls them.
pub trait BytecodeNormalizer: Send + Sync {
    fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>, NormalizeError>;
}

/// Collaborators shared by every transformer family.
#[derive(Clone)]
pub struct Environment {
    /// Prerequisite tool locations and persisted settings.
    pub config: HeliosConfig,
    /// Sink for recovered converter failures.
    pub reporter: Arc<dyn ExceptionReporter>,
    /// Launcher for external tools.
    pub launcher: Arc<dyn ProcessLauncher>,
}

impl Environment {
    /// Creates an environment that logs reports and launches real processes
    /// with the config's timeout.
    pub fn new(config: HeliosConfig) -> Self {
        let launcher = SystemLauncher::new().with_default_timeout(config.process_timeout());
        Self {
            config,
            reporter: Arc::new(TracingReporter),
            launcher: Arc::new(launcher),
        }
    }

    /// Loads the config from its default location. A config that fails to
    /// load is logged and replaced by defaults.
    pub fn from_default_config() -> Self {
        let config = HeliosConfig::load_or_default(None).unwrap_or_else(|err| {
            tracing::warn!(%err, "failed to load config, using defaults");
            HeliosConfig::default()
        });
        Self::new(config)
    }

    /// Replaces the reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ExceptionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replaces the launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(HeliosConfig::default())
    }
}
