//! Launching the external solver and collecting what it wrote.

mod discovery;

pub use discovery::{DiscoveredProbe, discover_probe_files, list_probe_files};

use crate::domain::{FdtdError, RunStatus, Termination};
use crate::probes::ProbeFileName;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_SUCCESS_CODE: i32 = 0;
const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("solver configuration '{}' does not exist", path.display())]
    MissingConfig { path: PathBuf },
    #[error("solver run has already been started (status {status})")]
    AlreadyStarted { status: RunStatus },
    #[error("failed to launch solver '{}': {source}", exe.display())]
    Launch {
        exe: PathBuf,
        source: std::io::Error,
    },
    #[error("failed while waiting for solver '{}': {source}", exe.display())]
    Wait {
        exe: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to list probe files in '{}': {source}", path.display())]
    Discovery {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ProcessError> for FdtdError {
    fn from(error: ProcessError) -> Self {
        let message = error.to_string();
        match error {
            ProcessError::MissingConfig { .. } => {
                FdtdError::input_validation("INPUT.SOLVER_CONFIG", message)
            }
            ProcessError::AlreadyStarted { .. } => {
                FdtdError::internal("SYS.SOLVER_STATE", message)
            }
            ProcessError::Launch { .. } => FdtdError::io_system("IO.SOLVER_LAUNCH", message),
            ProcessError::Wait { .. } => FdtdError::io_system("IO.SOLVER_WAIT", message),
            ProcessError::Discovery { .. } => {
                FdtdError::io_system("IO.PROBE_DISCOVERY", message)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverOptions {
    /// Exit code the solver reports on success.
    pub success_code: i32,
    /// Kill the solver once this much wall time has passed. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            success_code: DEFAULT_SUCCESS_CODE,
            timeout: None,
        }
    }
}

/// One invocation of the solver against one configuration file.
///
/// The solver is started as `exe <config file name>` inside the directory that
/// holds the configuration, so excitation files and probe outputs live next to
/// it. A run moves `NotStarted -> Running -> Succeeded | Failed` exactly once.
#[derive(Debug)]
pub struct SolverRun {
    exe_path: PathBuf,
    config_path: PathBuf,
    working_directory: PathBuf,
    options: SolverOptions,
    status: RunStatus,
    termination: Option<Termination>,
}

impl SolverRun {
    pub fn new(exe_path: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let working_directory = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            exe_path: exe_path.into(),
            config_path,
            working_directory,
            options: SolverOptions::default(),
            status: RunStatus::NotStarted,
            termination: None,
        }
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn exe_path(&self) -> &Path {
        &self.exe_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub const fn options(&self) -> SolverOptions {
        self.options
    }

    pub const fn status(&self) -> RunStatus {
        self.status
    }

    pub const fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.termination.and_then(Termination::exit_code)
    }

    pub fn has_finished_successfully(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Runs the solver to completion and returns the terminal status.
    ///
    /// A solver that exits with anything other than the success code is a
    /// `Failed` run, not an error. Errors are reserved for runs that could not
    /// be started or observed.
    pub fn run(&mut self) -> Result<RunStatus, ProcessError> {
        if self.status != RunStatus::NotStarted {
            return Err(ProcessError::AlreadyStarted {
                status: self.status,
            });
        }

        let config_file_name = match self.config_path.file_name() {
            Some(name) if self.config_path.is_file() => name.to_os_string(),
            _ => {
                return Err(ProcessError::MissingConfig {
                    path: self.config_path.clone(),
                });
            }
        };

        let exe = resolve_program(&self.exe_path);
        let mut command = Command::new(&exe);
        command
            .arg(&config_file_name)
            .current_dir(&self.working_directory)
            .stdin(Stdio::null());

        let child = command.spawn().map_err(|source| ProcessError::Launch {
            exe: self.exe_path.clone(),
            source,
        })?;
        self.status = RunStatus::Running;
        tracing::debug!(
            exe = %exe.display(),
            config = %self.config_path.display(),
            cwd = %self.working_directory.display(),
            pid = child.id(),
            "spawned solver"
        );

        let termination = match self.wait_for(child) {
            Ok(termination) => termination,
            Err(source) => {
                self.status = RunStatus::Failed;
                return Err(ProcessError::Wait {
                    exe: self.exe_path.clone(),
                    source,
                });
            }
        };

        self.termination = Some(termination);
        self.status = if termination == Termination::Exited(self.options.success_code) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        tracing::info!(
            config = %self.config_path.display(),
            status = %self.status,
            termination = %termination,
            "solver finished"
        );
        Ok(self.status)
    }

    fn wait_for(&self, mut child: Child) -> std::io::Result<Termination> {
        match self.options.timeout {
            None => child.wait().map(classify_exit),
            Some(timeout) => wait_with_deadline(&mut child, timeout, &self.config_path),
        }
    }

    /// Base names of the probe files for `probe_name`, in directory order.
    ///
    /// Empty before the run starts. After a failed run this reports whatever
    /// partial output the solver left behind.
    pub fn solved_probe_filenames(&self, probe_name: &str) -> Result<Vec<String>, ProcessError> {
        Ok(self
            .solved_probe_paths(probe_name)?
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .map(str::to_string)
            .collect())
    }

    pub fn solved_probe_paths(&self, probe_name: &str) -> Result<Vec<PathBuf>, ProcessError> {
        if self.status == RunStatus::NotStarted {
            return Ok(Vec::new());
        }
        discover_probe_files(&self.working_directory, probe_name)
    }

    /// Every probe file in the working directory, whatever its probe name.
    pub fn solved_probes(&self) -> Result<Vec<ProbeFileName>, ProcessError> {
        if self.status == RunStatus::NotStarted {
            return Ok(Vec::new());
        }
        Ok(list_probe_files(&self.working_directory)?
            .into_iter()
            .map(|probe| probe.file_name)
            .collect())
    }
}

/// The slice of a child process the timeout loop needs.
trait SolverProcess {
    fn try_wait(&mut self) -> std::io::Result<Option<Termination>>;
    fn kill(&mut self) -> std::io::Result<()>;
    fn wait(&mut self) -> std::io::Result<Termination>;
}

impl SolverProcess for Child {
    fn try_wait(&mut self) -> std::io::Result<Option<Termination>> {
        Ok(Child::try_wait(self)?.map(classify_exit))
    }

    fn kill(&mut self) -> std::io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> std::io::Result<Termination> {
        Child::wait(self).map(classify_exit)
    }
}

/// Polls `process` until it exits or `timeout` passes. The process is killed
/// and reaped on expiry and when polling itself fails.
fn wait_with_deadline(
    process: &mut impl SolverProcess,
    timeout: Duration,
    config_path: &Path,
) -> std::io::Result<Termination> {
    let deadline = Instant::now() + timeout;
    loop {
        match process.try_wait() {
            Ok(Some(termination)) => return Ok(termination),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    config = %config_path.display(),
                    %error,
                    "lost track of solver; killing it"
                );
                reap(process);
                return Err(error);
            }
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(TIMEOUT_POLL_INTERVAL);
    }

    tracing::warn!(
        config = %config_path.display(),
        timeout_ms = timeout.as_millis() as u64,
        "solver exceeded its timeout; killing it"
    );
    // The child may exit between the last poll and the kill.
    if let Err(error) = process.kill() {
        tracing::debug!(%error, "kill after timeout failed");
    }
    process.wait()?;
    Ok(Termination::TimedOut)
}

fn reap(process: &mut impl SolverProcess) {
    if let Err(error) = process.kill() {
        tracing::debug!(%error, "kill of unobservable solver failed");
    }
    if let Err(error) = process.wait() {
        tracing::debug!(%error, "reaping unobservable solver failed");
    }
}

fn classify_exit(status: ExitStatus) -> Termination {
    match status.code() {
        Some(code) => Termination::Exited(code),
        None => Termination::Signaled,
    }
}

// Relative paths with a directory part would otherwise be resolved against
// the solver's working directory on some platforms.
fn resolve_program(exe: &Path) -> PathBuf {
    if exe.is_relative()
        && exe.components().count() > 1
        && let Ok(current_dir) = std::env::current_dir()
    {
        return current_dir.join(exe);
    }
    exe.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::{
        ProcessError, SolverOptions, SolverProcess, SolverRun, resolve_program,
        wait_with_deadline,
    };
    use crate::domain::{FdtdError, FdtdErrorCategory, RunStatus, Termination};
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Scripted stand-in for a child process.
    #[derive(Default)]
    struct FakeProcess {
        polls: Vec<io::Result<Option<Termination>>>,
        killed: bool,
        reaped: bool,
    }

    impl SolverProcess for FakeProcess {
        fn try_wait(&mut self) -> io::Result<Option<Termination>> {
            if self.polls.is_empty() {
                Ok(None)
            } else {
                self.polls.remove(0)
            }
        }

        fn kill(&mut self) -> io::Result<()> {
            self.killed = true;
            Ok(())
        }

        fn wait(&mut self) -> io::Result<Termination> {
            self.reaped = true;
            Ok(Termination::Signaled)
        }
    }

    #[test]
    fn working_directory_is_the_config_parent() {
        let run = SolverRun::new("solver", "/cases/holland1981/holland1981.fdtd.json");
        assert_eq!(run.working_directory(), Path::new("/cases/holland1981"));
        assert_eq!(run.options(), SolverOptions::default());

        let bare = SolverRun::new("solver", "holland1981.fdtd.json");
        assert_eq!(bare.working_directory(), Path::new("."));
    }

    #[test]
    fn unstarted_run_reports_nothing() {
        let run = SolverRun::new("solver", "/cases/holland1981/holland1981.fdtd.json");
        assert_eq!(run.status(), RunStatus::NotStarted);
        assert!(!run.has_finished_successfully());
        assert_eq!(run.exit_code(), None);
        assert!(
            run.solved_probe_filenames("mid_point")
                .expect("unstarted discovery should succeed")
                .is_empty()
        );
        assert!(
            run.solved_probes()
                .expect("unstarted discovery should succeed")
                .is_empty()
        );
    }

    #[test]
    fn missing_config_is_rejected_before_launch() {
        let temp = TempDir::new().expect("tempdir should be created");
        let mut run = SolverRun::new("solver", temp.path().join("absent.fdtd.json"));

        let error = run.run().expect_err("missing config should fail");
        assert!(matches!(error, ProcessError::MissingConfig { .. }));
        assert_eq!(run.status(), RunStatus::NotStarted);
        assert_eq!(
            FdtdError::from(error).category(),
            FdtdErrorCategory::InputValidation
        );
    }

    #[test]
    fn unlaunchable_solver_leaves_run_not_started() {
        let temp = TempDir::new().expect("tempdir should be created");
        let config = temp.path().join("holland1981.fdtd.json");
        fs::write(&config, "{}").expect("config should be written");
        let mut run = SolverRun::new(temp.path().join("no-such-solver"), &config);

        let error = run.run().expect_err("missing executable should fail");
        assert!(matches!(error, ProcessError::Launch { .. }));
        assert_eq!(run.status(), RunStatus::NotStarted);
        assert!(!run.has_finished_successfully());
        assert_eq!(FdtdError::from(error).code(), "IO.SOLVER_LAUNCH");
    }

    #[test]
    fn failed_poll_kills_and_reaps_the_solver() {
        let mut process = FakeProcess {
            polls: vec![Ok(None), Err(io::Error::other("poll failed"))],
            ..FakeProcess::default()
        };

        let error = wait_with_deadline(
            &mut process,
            Duration::from_secs(30),
            Path::new("case.fdtd.json"),
        )
        .expect_err("poll failure should be reported");
        assert_eq!(error.to_string(), "poll failed");
        assert!(process.killed);
        assert!(process.reaped);
    }

    #[test]
    fn exit_before_deadline_is_returned_without_kill() {
        let mut process = FakeProcess {
            polls: vec![Ok(None), Ok(Some(Termination::Exited(0)))],
            ..FakeProcess::default()
        };

        let termination = wait_with_deadline(
            &mut process,
            Duration::from_secs(30),
            Path::new("case.fdtd.json"),
        )
        .expect("exit should be observed");
        assert_eq!(termination, Termination::Exited(0));
        assert!(!process.killed);
        assert!(!process.reaped);
    }

    #[test]
    fn expired_deadline_times_out() {
        let mut process = FakeProcess::default();
        let termination =
            wait_with_deadline(&mut process, Duration::ZERO, Path::new("case.fdtd.json"))
                .expect("timeout should be reported as a termination");
        assert_eq!(termination, Termination::TimedOut);
        assert!(process.killed && process.reaped);
    }

    #[test]
    fn bare_program_names_are_left_for_path_lookup() {
        assert_eq!(resolve_program(Path::new("solver")), PathBuf::from("solver"));
        assert_eq!(
            resolve_program(Path::new("/opt/fdtd/bin/solver")),
            PathBuf::from("/opt/fdtd/bin/solver")
        );
        assert!(resolve_program(Path::new("bin/solver")).is_absolute());
    }
}
