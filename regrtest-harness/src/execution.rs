//! Running test units as child processes.

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use crate::{
    filesystem::Filesystem,
    loader::UnitLoader,
    unit::{Signal, TestContext, TestUnit, TestUnitId},
};

/// Exit code a script uses to decline to run.
pub const SKIP_EXIT_CODE: i32 = 77;

/// Exit code a script uses to report an explicit failure.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Environment variable holding the run's verbosity level.
pub const VERBOSE_ENV_VAR: &str = "REGRTEST_VERBOSE";

/// Environment variable holding the comma-separated enabled resources.
pub const USE_RESOURCES_ENV_VAR: &str = "REGRTEST_USE_RESOURCES";

/// Environment variable holding the name of the unit being run.
pub const TEST_NAME_ENV_VAR: &str = "REGRTEST_TEST_NAME";

#[cfg(unix)]
const SIGINT: i32 = 2;

/// Loads test units by running `<root>/<name>.<ext>` as a child process.
#[derive(Clone)]
pub struct ScriptLoader<'a> {
    fs: &'a dyn Filesystem,
    interpreter: Vec<String>,
    source_extension: String,
}

impl<'a> ScriptLoader<'a> {
    /// Creates a loader. With an empty interpreter, scripts are executed directly.
    pub fn new(
        fs: &'a dyn Filesystem,
        interpreter: Vec<String>,
        source_extension: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            interpreter,
            source_extension: source_extension.into(),
        }
    }
}

impl std::fmt::Debug for ScriptLoader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptLoader")
            .field("interpreter", &self.interpreter)
            .field("source_extension", &self.source_extension)
            .finish_non_exhaustive()
    }
}

impl UnitLoader for ScriptLoader<'_> {
    fn load(&mut self, unit: &TestUnitId) -> Result<Box<dyn TestUnit>, Signal> {
        let path = unit.source_path(&self.source_extension);
        if !self.fs.exists(&path) || self.fs.is_dir(&path) {
            return Err(Signal::LoadFailure(std::format!(
                "No module named {}",
                unit.name()
            )));
        }

        Ok(Box::new(ScriptUnit {
            interpreter: self.interpreter.clone(),
            path,
        }))
    }
}

struct ScriptUnit {
    interpreter: Vec<String>,
    path: PathBuf,
}

impl ScriptUnit {
    fn command(&self) -> Command {
        let file_name = self.path.file_name().map_or_else(PathBuf::new, PathBuf::from);

        let mut cmd = match self.interpreter.split_first() {
            Some((program, args)) => {
                let mut cmd = Command::new(program);
                cmd.args(args).arg(&file_name);
                cmd
            }
            None => Command::new(Path::new(".").join(&file_name)),
        };

        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }

        cmd
    }
}

impl TestUnit for ScriptUnit {
    fn load(&mut self, ctx: &mut TestContext<'_>) -> Result<(), Signal> {
        let mut cmd = self.command();
        cmd.stdin(Stdio::null())
            .env(VERBOSE_ENV_VAR, ctx.verbose().to_string())
            .env(USE_RESOURCES_ENV_VAR, ctx.resources().to_list_string())
            .env(TEST_NAME_ENV_VAR, ctx.unit().name());

        tracing::debug!(target: crate::trace_categories::RUNNER, "launching {cmd:?}");

        let output = cmd.output().map_err(|e| {
            Signal::LoadFailure(std::format!("failed to launch {}: {e}", self.path.display()))
        })?;

        ctx.stdout().write_all(&output.stdout)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if ctx.verbose() > 0 && !stderr.is_empty() {
            std::io::stderr().write_all(stderr.as_bytes())?;
        }

        classify_exit(output.status, &stderr)
    }
}

/// Maps a child's exit status onto a signal, taking reasons from its stderr.
fn classify_exit(status: ExitStatus, stderr: &str) -> Result<(), Signal> {
    let reason = last_line(stderr);

    match status.code() {
        Some(0) => Ok(()),
        Some(SKIP_EXIT_CODE) => Err(Signal::Skip(reason.unwrap_or("skipped by test").to_owned())),
        Some(FAILURE_EXIT_CODE) => Err(Signal::Failure(
            reason.unwrap_or("test reported failure").to_owned(),
        )),
        Some(code) => Err(Signal::Fault {
            kind: std::format!("exit status {code}"),
            value: reason.unwrap_or_default().to_owned(),
            trace: non_empty(stderr),
        }),
        None => classify_signal(status, stderr),
    }
}

#[cfg(unix)]
fn classify_signal(status: ExitStatus, stderr: &str) -> Result<(), Signal> {
    match status.signal() {
        Some(SIGINT) => Err(Signal::Interrupt),
        signal => Err(Signal::Fault {
            kind: "killed by signal".to_owned(),
            value: signal.map(|s| s.to_string()).unwrap_or_default(),
            trace: non_empty(stderr),
        }),
    }
}

#[cfg(not(unix))]
fn classify_signal(_status: ExitStatus, stderr: &str) -> Result<(), Signal> {
    Err(Signal::Fault {
        kind: "abnormal exit".to_owned(),
        value: last_line(stderr).unwrap_or_default().to_owned(),
        trace: non_empty(stderr),
    })
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|line| !line.is_empty())
}

fn non_empty(text: &str) -> Option<String> {
    (!text.trim().is_empty()).then(|| text.to_owned())
}
