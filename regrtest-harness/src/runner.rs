//! Running a single test unit and classifying what happened.

use std::io::Write;

use crate::{
    capture::{OutputCapture, OutputStream},
    error::{Error, FilesystemError},
    filesystem::Filesystem,
    leaks::LeakDetector,
    loader::{ModuleTable, UnitLoader},
    reporting::Painter,
    resources::ResourceSet,
    unit::{RunOutcome, Signal, TestContext, TestUnitId},
};

/// Per-run settings the runner needs.
#[derive(Clone, Debug, Default)]
pub struct RunnerSettings {
    /// Verbosity; when non-zero, output is neither captured nor compared.
    pub verbose: u8,
    /// Suppress skip messages.
    pub quiet: bool,
    /// Write golden files instead of comparing against them.
    pub generate: bool,
    /// Resources units may use.
    pub resources: ResourceSet,
}

/// Runs test units one at a time.
pub struct TestRunner<'a> {
    fs: &'a dyn Filesystem,
    loader: Box<dyn UnitLoader + 'a>,
    stdout: OutputStream,
    modules: ModuleTable,
    settings: RunnerSettings,
    painter: Painter,
    leak_detector: Option<Box<dyn LeakDetector + 'a>>,
    leaked: Vec<String>,
}

impl<'a> TestRunner<'a> {
    /// Creates a runner writing operator-facing text to `stdout`.
    pub fn new(
        fs: &'a dyn Filesystem,
        loader: Box<dyn UnitLoader + 'a>,
        stdout: OutputStream,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            fs,
            loader,
            stdout,
            modules: ModuleTable::default(),
            settings,
            painter: Painter::plain(),
            leak_detector: None,
            leaked: vec![],
        }
    }

    /// Sets how report lines are colored.
    #[must_use]
    pub const fn with_painter(mut self, painter: Painter) -> Self {
        self.painter = painter;
        self
    }

    /// Scans for leaks after every test with the given detector.
    #[must_use]
    pub fn with_leak_detector(mut self, detector: Box<dyn LeakDetector + 'a>) -> Self {
        self.leak_detector = Some(detector);
        self
    }

    /// Everything leak detection has reported so far.
    pub fn leaked(&self) -> &[String] {
        &self.leaked
    }

    /// Units currently loaded.
    pub const fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    /// Runs one unit.
    ///
    /// Per-test problems are outcomes. An error means the run as a whole must
    /// stop: the operator interrupted it, or the harness itself failed.
    pub fn run(&mut self, unit: &TestUnitId) -> Result<RunOutcome, Error> {
        self.modules.forget(unit.name());
        let baseline = self.modules.names();

        let outcome = self.run_and_classify(unit);

        if !matches!(outcome, Err(Error::Interrupted)) {
            self.scan_for_leaks()?;
        }

        let unloaded = self.modules.unload_new(&baseline);
        if !unloaded.is_empty() {
            tracing::debug!(target: crate::trace_categories::RUNNER, "unloaded {unloaded:?}");
        }

        if let Ok(outcome) = &outcome {
            tracing::debug!(target: crate::trace_categories::RUNNER, "{}: {outcome:?}", unit.name());
        }

        outcome
    }

    fn run_and_classify(&mut self, unit: &TestUnitId) -> Result<RunOutcome, Error> {
        let (result, captured) = self.execute(unit)?;
        let name = unit.name();

        match result {
            Err(Signal::LoadFailure(reason) | Signal::Skip(reason)) => {
                if !self.settings.quiet {
                    writeln!(self.stdout, "{name} skipped -- {reason}")?;
                    self.stdout.flush()?;
                }
                Ok(RunOutcome::Skipped(reason))
            }
            Err(Signal::Interrupt) => Err(Error::Interrupted),
            Err(Signal::Failure(reason)) => {
                let line = std::format!("test {name} failed -- {reason}");
                writeln!(self.stdout, "{}", self.painter.failure(&line))?;
                self.stdout.flush()?;
                Ok(RunOutcome::Failed(reason))
            }
            Err(Signal::Fault { kind, value, trace }) => {
                let line = std::format!("test {name} crashed -- {kind}: {value}");
                writeln!(self.stdout, "{}", self.painter.failure(&line))?;

                if self.settings.verbose > 0
                    && let Some(trace) = trace
                {
                    let indented = indent::indent_all_by(4, trace);
                    write!(self.stdout, "{indented}")?;
                    if !indented.ends_with('\n') {
                        writeln!(self.stdout)?;
                    }
                }

                self.stdout.flush()?;
                Ok(RunOutcome::Crashed { kind, value })
            }
            Ok(()) => match captured {
                None => Ok(RunOutcome::Passed),
                Some(output) => self.compare_or_generate(unit, &output),
            },
        }
    }

    /// Loads and runs the unit, capturing its output unless verbose.
    fn execute(&mut self, unit: &TestUnitId) -> Result<(Result<(), Signal>, Option<Vec<u8>>), Error> {
        let capture = if self.settings.verbose == 0 {
            Some(OutputCapture::begin(&self.stdout)?)
        } else {
            None
        };

        let result = self.load_and_run(unit, capture.is_some());
        let captured = capture.map(OutputCapture::finish);

        Ok((result, captured))
    }

    fn load_and_run(&mut self, unit: &TestUnitId, capturing: bool) -> Result<(), Signal> {
        let mut stdout = self.stdout.clone();
        if capturing {
            // Golden output starts with the unit's name.
            writeln!(stdout, "{}", unit.name())?;
        }

        let mut loaded = self.loader.load(unit)?;

        self.modules.begin_loading(unit.name());
        let result = {
            let mut ctx = TestContext::new(
                stdout,
                self.settings.verbose,
                &self.settings.resources,
                unit,
                &mut self.modules,
                &mut *self.loader,
            );

            match loaded.load(&mut ctx) {
                Ok(()) => loaded.entry_point(&mut ctx).unwrap_or(Ok(())),
                Err(signal) => Err(signal),
            }
        };
        self.modules.finish_loading(unit.name());
        result?;

        self.modules.insert(unit.name(), loaded);
        Ok(())
    }

    fn compare_or_generate(&mut self, unit: &TestUnitId, output: &[u8]) -> Result<RunOutcome, Error> {
        let golden_path = unit.golden_path();
        let baseline = unit.baseline_output();

        if self.settings.generate {
            if output == baseline.as_bytes() {
                if self.fs.exists(&golden_path) {
                    writeln!(
                        self.stdout,
                        "output file {} is no longer needed; consider removing it",
                        golden_path.display()
                    )?;
                } else {
                    return Ok(RunOutcome::Passed);
                }
            }

            if let Some(parent) = golden_path.parent() {
                self.fs.make_directories(parent)?;
            }
            self.fs.write_all(&golden_path, output)?;

            tracing::debug!(target: crate::trace_categories::RUNNER, "wrote {}", golden_path.display());
            return Ok(RunOutcome::Passed);
        }

        let expected = match self.fs.read_all(&golden_path) {
            Ok(contents) => contents,
            Err(FilesystemError::NotFound(_)) => baseline.into_bytes(),
            Err(e) => return Err(e.into()),
        };

        if output == expected.as_slice() {
            return Ok(RunOutcome::Passed);
        }

        let line = std::format!("test {} produced unexpected output:", unit.name());
        writeln!(self.stdout, "{}", self.painter.failure(&line))?;
        self.stdout.flush()?;

        crate::textdiff::write_report(
            &mut self.stdout,
            &String::from_utf8_lossy(&expected),
            &String::from_utf8_lossy(output),
            &self.painter,
        )?;
        self.stdout.flush()?;

        Ok(RunOutcome::Failed("produced unexpected output".to_owned()))
    }

    fn scan_for_leaks(&mut self) -> Result<(), Error> {
        let Some(detector) = self.leak_detector.as_mut() else {
            return Ok(());
        };

        let leaked = detector.detect_leaked();
        if !leaked.is_empty() {
            writeln!(
                self.stdout,
                "{}",
                self.painter.notice(&std::format!(
                    "Warning: test created {} uncollectable object(s).",
                    leaked.len()
                ))
            )?;
            self.leaked.extend(leaked);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capture::MemoryOutput,
        filesystem::HostFilesystem,
        loader::Registry,
        resources::Resource,
        support,
    };
    use anyhow::Result;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    struct Fixture {
        dir: assert_fs::TempDir,
        output: MemoryOutput,
        stdout: OutputStream,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let (stdout, output) = OutputStream::in_memory();
            Ok(Self {
                dir: assert_fs::TempDir::new()?,
                output,
                stdout,
            })
        }

        fn id(&self, name: &str) -> TestUnitId {
            TestUnitId::new(name, self.dir.path())
        }

        fn runner(&self, registry: Registry, settings: RunnerSettings) -> TestRunner<'static> {
            TestRunner::new(&HostFilesystem, Box::new(registry), self.stdout.clone(), settings)
        }
    }

    fn generating() -> RunnerSettings {
        RunnerSettings {
            generate: true,
            ..RunnerSettings::default()
        }
    }

    fn greeter() -> Registry {
        let mut registry = Registry::new();
        registry.register_fn("test_hello", |ctx| ctx.print("hello"));
        registry.register_fn("test_silent", |_| Ok(()));
        registry
    }

    #[test]
    fn mutually_importing_units_load_once() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut registry = Registry::new();
        registry
            .register_fn("test_a", |ctx| {
                ctx.import("test_b")?;
                ctx.print("a loaded")
            })
            .register_fn("test_b", |ctx| {
                ctx.import("test_a")?;
                ctx.print("b loaded")
            })
            .register_fn("test_self", |ctx| ctx.import("test_self"));
        let mut runner = fixture.runner(registry, generating());

        assert_eq!(runner.run(&fixture.id("test_a"))?, RunOutcome::Passed);
        assert_eq!(runner.run(&fixture.id("test_self"))?, RunOutcome::Passed);

        fixture.dir.child("output/test_a").assert("test_a\nb loaded\na loaded\n");
        assert!(!fixture.dir.child("output/test_self").path().exists());
        assert!(!runner.modules().is_loading("test_a"));
        assert!(!runner.modules().is_loading("test_self"));
        Ok(())
    }

    #[test]
    fn silent_unit_passes_without_golden_file() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut runner = fixture.runner(greeter(), RunnerSettings::default());

        assert_eq!(runner.run(&fixture.id("test_silent"))?, RunOutcome::Passed);
        assert_eq!(fixture.output.contents(), "");
        Ok(())
    }

    #[test]
    fn unexpected_output_fails_with_diff() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut runner = fixture.runner(greeter(), RunnerSettings::default());

        let outcome = runner.run(&fixture.id("test_hello"))?;

        assert!(matches!(outcome, RunOutcome::Failed(_)));
        let text = fixture.output.contents();
        assert!(text.starts_with("test test_hello produced unexpected output:\n"));
        assert!(text.contains(
            "*** line 2 of actual output doesn't appear in expected output after line 1:\n+ hello\n"
        ));
        Ok(())
    }

    #[test]
    fn generated_golden_file_round_trips() -> Result<()> {
        let fixture = Fixture::new()?;
        let id = fixture.id("test_hello");

        let mut runner = fixture.runner(greeter(), generating());
        assert_eq!(runner.run(&id)?, RunOutcome::Passed);
        let first = std::fs::read(id.golden_path())?;
        assert_eq!(first, b"test_hello\nhello\n");

        assert_eq!(runner.run(&id)?, RunOutcome::Passed);
        assert_eq!(std::fs::read(id.golden_path())?, first);

        let mut runner = fixture.runner(greeter(), RunnerSettings::default());
        assert_eq!(runner.run(&id)?, RunOutcome::Passed);
        Ok(())
    }

    #[test]
    fn trivial_output_does_not_create_golden_file() -> Result<()> {
        let fixture = Fixture::new()?;
        let id = fixture.id("test_silent");
        let mut runner = fixture.runner(greeter(), generating());

        assert_eq!(runner.run(&id)?, RunOutcome::Passed);
        assert!(!id.golden_path().exists());
        Ok(())
    }

    #[test]
    fn trivial_output_keeps_existing_golden_file() -> Result<()> {
        let fixture = Fixture::new()?;
        let id = fixture.id("test_silent");
        fixture
            .dir
            .child("output/test_silent")
            .write_str("test_silent\nold output\n")?;

        let mut runner = fixture.runner(greeter(), generating());
        assert_eq!(runner.run(&id)?, RunOutcome::Passed);

        assert!(fixture.output.contents().contains("is no longer needed; consider removing it"));
        assert_eq!(std::fs::read_to_string(id.golden_path())?, "test_silent\n");
        Ok(())
    }

    #[test]
    fn signals_are_classified() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut registry = Registry::new();
        registry
            .register_fn("test_skip", |_| support::skip("no curses"))
            .register_fn("test_fail", |_| support::vereq(1, 2))
            .register_fn("test_crash", |_| {
                Err(Signal::fault("ZeroDivisionError", "division by zero"))
            })
            .register_fn("test_net", |ctx| ctx.requires(Resource::Network));

        let mut runner = fixture.runner(registry, RunnerSettings::default());

        assert_eq!(
            runner.run(&fixture.id("test_skip"))?,
            RunOutcome::Skipped("no curses".to_owned())
        );
        assert_eq!(
            runner.run(&fixture.id("test_fail"))?,
            RunOutcome::Failed("1 == 2".to_owned())
        );
        assert_eq!(
            runner.run(&fixture.id("test_crash"))?,
            RunOutcome::Crashed {
                kind: "ZeroDivisionError".to_owned(),
                value: "division by zero".to_owned(),
            }
        );
        assert!(matches!(runner.run(&fixture.id("test_net"))?, RunOutcome::Skipped(_)));
        assert!(matches!(runner.run(&fixture.id("test_missing"))?, RunOutcome::Skipped(_)));

        assert_eq!(
            fixture.output.contents(),
            [
                "test_skip skipped -- no curses",
                "test test_fail failed -- 1 == 2",
                "test test_crash crashed -- ZeroDivisionError: division by zero",
                "test_net skipped -- Use of the `network' resource not enabled",
                "test_missing skipped -- no unit named test_missing",
                "",
            ]
            .join("\n")
        );
        Ok(())
    }

    #[test]
    fn quiet_hides_skip_messages() -> Result<()> {
        let fixture = Fixture::new()?;
        let settings = RunnerSettings {
            quiet: true,
            ..RunnerSettings::default()
        };
        let mut runner = fixture.runner(Registry::new(), settings);

        assert!(matches!(runner.run(&fixture.id("test_x"))?, RunOutcome::Skipped(_)));
        assert_eq!(fixture.output.contents(), "");
        Ok(())
    }

    #[test]
    fn interrupt_stops_the_run() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut registry = Registry::new();
        registry.register_fn("test_ctrl_c", |_| Err(Signal::Interrupt));
        let mut runner = fixture.runner(registry, RunnerSettings::default());

        assert!(matches!(runner.run(&fixture.id("test_ctrl_c")), Err(Error::Interrupted)));
        assert!(!fixture.stdout.is_capturing());
        Ok(())
    }

    #[test]
    fn verbose_runs_are_not_captured_or_compared() -> Result<()> {
        let fixture = Fixture::new()?;
        let settings = RunnerSettings {
            verbose: 1,
            ..RunnerSettings::default()
        };
        let mut runner = fixture.runner(greeter(), settings);

        assert_eq!(runner.run(&fixture.id("test_hello"))?, RunOutcome::Passed);
        assert_eq!(fixture.output.contents(), "hello\n");
        Ok(())
    }

    #[test]
    fn crash_trace_is_shown_only_when_verbose() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut registry = Registry::new();
        registry.register_fn("test_crash", |_| {
            Err(Signal::Fault {
                kind: "exit status 3".to_owned(),
                value: "boom".to_owned(),
                trace: Some("Traceback\nboom".to_owned()),
            })
        });
        let settings = RunnerSettings {
            verbose: 1,
            ..RunnerSettings::default()
        };
        let mut runner = fixture.runner(registry, settings);
        runner.run(&fixture.id("test_crash"))?;

        assert_eq!(
            fixture.output.contents(),
            "test test_crash crashed -- exit status 3: boom\n    Traceback\n    boom\n"
        );
        Ok(())
    }

    #[test]
    fn imported_test_units_are_unloaded() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut registry = Registry::new();
        registry
            .register_fn("test_main", |ctx| {
                ctx.import("test_shared")?;
                ctx.import("helper")
            })
            .register_fn("test_shared", |_| Ok(()))
            .register_fn("helper", |_| Ok(()));

        let mut runner = fixture.runner(registry, RunnerSettings::default());
        assert_eq!(runner.run(&fixture.id("test_main"))?, RunOutcome::Passed);

        let loaded: Vec<String> = runner.modules().names().into_iter().collect();
        assert_eq!(loaded, vec!["helper"]);
        Ok(())
    }

    #[test]
    fn leaks_are_reported_once() -> Result<()> {
        struct OneLeak(bool);

        impl LeakDetector for OneLeak {
            fn detect_leaked(&mut self) -> Vec<String> {
                if std::mem::replace(&mut self.0, true) {
                    vec![]
                } else {
                    vec!["tmpfile".to_owned()]
                }
            }
        }

        let fixture = Fixture::new()?;
        let mut runner = fixture
            .runner(greeter(), RunnerSettings::default())
            .with_leak_detector(Box::new(OneLeak(false)));

        runner.run(&fixture.id("test_silent"))?;
        runner.run(&fixture.id("test_silent"))?;

        assert_eq!(runner.leaked(), ["tmpfile".to_owned()]);
        assert_eq!(
            fixture.output.contents(),
            "Warning: test created 1 uncollectable object(s).\n"
        );
        Ok(())
    }
}
