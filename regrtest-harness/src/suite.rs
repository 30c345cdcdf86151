//! Orchestrates a whole run: options, discovery, execution and reporting.

use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    capture::OutputStream,
    config::{SuiteConfig, SuiteOptions},
    discovery,
    error::Error,
    expectations::ExpectedSkips,
    filesystem::{Filesystem, source_file_path},
    leaks::LeakDetector,
    loader::UnitLoader,
    memo::Memo,
    reporting::{Painter, SummaryStyle},
    runner::{RunnerSettings, TestRunner},
    unit::{RunOutcome, TestUnitId},
};

/// Stages of a run. A run only ever moves forward through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Validating options and preparing name lists.
    ParsingOptions,
    /// Locating test directories and test units.
    Discovering,
    /// Running the test at the given index.
    Running(usize),
    /// Sorting results.
    Reconciling,
    /// Writing the summary and memo.
    Reporting,
    /// Finished.
    Done,
}

impl Phase {
    const fn rank(self) -> u8 {
        match self {
            Self::ParsingOptions => 0,
            Self::Discovering => 1,
            Self::Running(_) => 2,
            Self::Reconciling => 3,
            Self::Reporting => 4,
            Self::Done => 5,
        }
    }

    /// Returns whether a run may move from this phase to `next`.
    pub const fn precedes(self, next: Self) -> bool {
        match (self, next) {
            (Self::Running(current), Self::Running(following)) => following > current,
            _ => next.rank() > self.rank(),
        }
    }

    fn advance(&mut self, next: Self) {
        debug_assert!(self.precedes(next), "{self:?} -> {next:?}");
        tracing::trace!(target: crate::trace_categories::SUITE, "{self:?} -> {next:?}");
        *self = next;
    }
}

/// Cooperative cancellation shared with whoever watches for operator interrupts.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop before the next test.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether a stop was requested.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Categorized outcomes of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuiteResult {
    /// Tests that passed.
    pub good: Vec<TestUnitId>,
    /// Tests that failed or crashed.
    pub bad: Vec<TestUnitId>,
    /// Tests that did not run.
    pub skipped: Vec<TestUnitId>,
    /// The run was cut short by the operator.
    pub interrupted: bool,
    /// More than one test directory was in play.
    pub multiple_roots: bool,
}

impl SuiteResult {
    /// Records one outcome.
    pub fn record(&mut self, unit: TestUnitId, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Passed => self.good.push(unit),
            RunOutcome::Failed(_) | RunOutcome::Crashed { .. } => self.bad.push(unit),
            RunOutcome::Skipped(_) => self.skipped.push(unit),
        }
    }

    /// Sorts every category, whatever order the tests ran in.
    pub fn finalize(&mut self) {
        self.good.sort();
        self.bad.sort();
        self.skipped.sort();
    }

    /// Returns whether no test failed; skips do not count against success.
    pub fn is_success(&self) -> bool {
        self.bad.is_empty()
    }

    /// Process exit code for this result: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }
}

/// A configured suite run.
pub struct Suite<'a> {
    options: SuiteOptions,
    config: SuiteConfig,
    fs: &'a dyn Filesystem,
    loader: Box<dyn UnitLoader + 'a>,
    stdout: OutputStream,
    leak_detector: Option<Box<dyn LeakDetector + 'a>>,
    interrupt: InterruptFlag,
    phase: Phase,
}

impl<'a> Suite<'a> {
    /// Prepares a run.
    pub fn new(
        options: SuiteOptions,
        config: SuiteConfig,
        fs: &'a dyn Filesystem,
        loader: Box<dyn UnitLoader + 'a>,
        stdout: OutputStream,
    ) -> Self {
        Self {
            options,
            config,
            fs,
            loader,
            stdout,
            leak_detector: None,
            interrupt: InterruptFlag::default(),
            phase: Phase::ParsingOptions,
        }
    }

    /// Provides the detector used when leak finding is requested.
    #[must_use]
    pub fn with_leak_detector(mut self, detector: Box<dyn LeakDetector + 'a>) -> Self {
        self.leak_detector = Some(detector);
        self
    }

    /// Shares the flag that requests the run to stop.
    #[must_use]
    pub fn with_interrupt_flag(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Runs the suite to completion, or until interrupted.
    pub fn run(self) -> Result<SuiteResult, Error> {
        let Self {
            options,
            config,
            fs,
            loader,
            mut stdout,
            leak_detector,
            interrupt,
            mut phase,
        } = self;

        options.validate()?;

        let extension = config.discovery.source_extension.as_str();
        let strip = |names: &[String]| -> Vec<String> {
            names
                .iter()
                .map(|name| discovery::strip_source_extension(name, extension))
                .collect()
        };

        let mut named = strip(&options.tests);
        let one_only = strip(&options.one_only);
        let mut standard = config.discovery.standard_tests.clone();
        let mut excluded = config.discovery.excluded_tests.clone();

        if options.exclude {
            discovery::apply_exclusions(&mut named, &mut standard, &mut excluded);
        }

        let leak_detector = if options.find_leaks {
            if leak_detector.is_none() {
                writeln!(stdout, "No leak detector available, disabling findleaks.")?;
            }
            leak_detector
        } else {
            None
        };

        phase.advance(Phase::Discovering);

        let roots = discovery::find_test_dirs(fs, &config.discovery.search_path, options.broad);
        if roots.is_empty() {
            tracing::warn!(
                target: crate::trace_categories::DISCOVERY,
                "no test directory found in {:?}",
                config.discovery.search_path
            );
        }

        let explicit = !named.is_empty();
        let mut tests = if explicit {
            named
        } else {
            discovery::find_all_tests(fs, &roots, extension, &standard, &excluded)?
        };

        if options.randomize {
            let seed = discovery::shuffle_tests(&mut tests, options.random_seed);
            tracing::info!(target: crate::trace_categories::SUITE, "shuffled tests using seed {seed}");
        }

        let settings = RunnerSettings {
            verbose: options.verbose,
            quiet: options.quiet,
            generate: options.generate,
            resources: options.use_resources.clone(),
        };

        let painter = Painter::new(options.color);
        let mut runner = TestRunner::new(fs, loader, stdout.clone(), settings).with_painter(painter);
        if let Some(detector) = leak_detector {
            runner = runner.with_leak_detector(detector);
        }

        let mut result = SuiteResult {
            multiple_roots: roots.len() > 1,
            ..SuiteResult::default()
        };

        'tests: for (index, name) in tests.iter().enumerate() {
            phase.advance(Phase::Running(index));

            let candidates = if one_only.contains(name) {
                &roots[..roots.len().min(1)]
            } else {
                &roots[..]
            };

            let mut found = false;
            for root in candidates {
                if interrupt.is_raised() {
                    result.interrupted = true;
                    break 'tests;
                }

                if !fs.exists(&source_file_path(root, name, extension)) {
                    continue;
                }
                found = true;

                if !options.quiet {
                    writeln!(stdout, "{name}")?;
                    stdout.flush()?;
                }

                let unit = TestUnitId::new(name.as_str(), root.as_path());
                match runner.run(&unit) {
                    Ok(outcome) => result.record(unit, &outcome),
                    Err(Error::Interrupted) => {
                        result.interrupted = true;
                        break 'tests;
                    }
                    Err(e) => return Err(e),
                }
            }

            if !found {
                if explicit {
                    tracing::warn!(target: crate::trace_categories::SUITE, "test {name} not found");
                } else {
                    tracing::debug!(target: crate::trace_categories::SUITE, "test {name} not found");
                }
            }
        }

        phase.advance(Phase::Reconciling);
        result.finalize();
        if result.interrupted {
            tracing::warn!(target: crate::trace_categories::SUITE, "run interrupted by operator");
        }

        phase.advance(Phase::Reporting);
        let expectations = ExpectedSkips::for_platform(&config.platform);
        let style = SummaryStyle {
            verbose: options.verbose,
            quiet: options.quiet,
            painter,
        };
        crate::reporting::write_summary(&mut stdout, &result, &expectations, &style)?;
        stdout.flush()?;

        if let Some(path) = &options.memo {
            Memo::from_result(&result).save(fs, path)?;
        }

        phase.advance(Phase::Done);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capture::MemoryOutput, config::DiscoveryConfig, filesystem::HostFilesystem,
        loader::Registry, support, unit::Signal,
    };
    use anyhow::Result;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn suite_dir(names: &[&str]) -> Result<assert_fs::TempDir> {
        let dir = assert_fs::TempDir::new()?;
        for name in names {
            dir.child(std::format!("{name}.py")).touch()?;
        }
        Ok(dir)
    }

    fn config_for(roots: &[&assert_fs::TempDir], standard: &[&str]) -> SuiteConfig {
        SuiteConfig {
            discovery: DiscoveryConfig {
                search_path: roots.iter().map(|r| r.path().to_path_buf()).collect(),
                source_extension: "py".to_owned(),
                standard_tests: strings(standard),
                excluded_tests: strings(&["test_support"]),
            },
            platform: "linux".to_owned(),
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_fn("test_grammar", |_| Ok(()))
            .register_fn("test_a", |_| Ok(()))
            .register_fn("test_b", |_| support::verify(false, "b is broken"))
            .register_fn("test_c", |_| support::skip("no c here"))
            .register_fn("test_d", |_| Ok(()));
        registry
    }

    fn run(options: SuiteOptions, config: SuiteConfig) -> Result<(SuiteResult, MemoryOutput)> {
        let (stdout, output) = OutputStream::in_memory();
        let result = Suite::new(options, config, &HostFilesystem, Box::new(registry()), stdout).run()?;
        Ok((result, output))
    }

    #[test]
    fn phases_only_move_forward() {
        assert!(Phase::ParsingOptions.precedes(Phase::Discovering));
        assert!(Phase::Discovering.precedes(Phase::Running(0)));
        assert!(Phase::Running(0).precedes(Phase::Running(1)));
        assert!(Phase::Running(3).precedes(Phase::Reconciling));
        assert!(!Phase::Running(1).precedes(Phase::Running(1)));
        assert!(!Phase::Reporting.precedes(Phase::Discovering));
    }

    #[test]
    fn results_are_sorted_even_when_randomized() -> Result<()> {
        let dir = suite_dir(&["test_d", "test_a", "test_b", "test_c"])?;
        let options = SuiteOptions {
            randomize: true,
            random_seed: Some(99),
            ..SuiteOptions::default()
        };

        let (result, _) = run(options, config_for(&[&dir], &[]))?;

        let names = |ids: &[TestUnitId]| ids.iter().map(|id| id.name().to_owned()).collect::<Vec<_>>();
        assert_eq!(names(&result.good), strings(&["test_a", "test_d"]));
        assert_eq!(names(&result.bad), strings(&["test_b"]));
        assert_eq!(names(&result.skipped), strings(&["test_c"]));
        assert_eq!(result.exit_code(), 1);
        Ok(())
    }

    #[test]
    fn skips_alone_are_success() -> Result<()> {
        let dir = suite_dir(&["test_a", "test_c"])?;
        let (result, output) = run(SuiteOptions::default(), config_for(&[&dir], &[]))?;

        assert_eq!(result.exit_code(), 0);
        assert_eq!(
            output.contents(),
            [
                "test_a",
                "test_c",
                "test_c skipped -- no c here",
                "1 test OK.",
                "1 test skipped:",
                "    test_c",
                "1 skip unexpected on linux:",
                "    test_c",
                "",
            ]
            .join("\n")
        );
        Ok(())
    }

    #[test]
    fn excluded_standard_test_never_runs() -> Result<()> {
        let dir = suite_dir(&["test_grammar", "test_a"])?;
        let options = SuiteOptions {
            exclude: true,
            tests: strings(&["test_grammar"]),
            ..SuiteOptions::default()
        };

        let (result, output) = run(options, config_for(&[&dir], &["test_grammar"]))?;

        assert_eq!(result.good, vec![TestUnitId::new("test_a", dir.path())]);
        assert!(!output.contents().contains("test_grammar"));
        Ok(())
    }

    #[test]
    fn explicit_names_may_carry_the_extension() -> Result<()> {
        let dir = suite_dir(&["test_a", "test_d"])?;
        let options = SuiteOptions {
            tests: strings(&["test_d.py"]),
            quiet: true,
            ..SuiteOptions::default()
        };

        let (result, output) = run(options, config_for(&[&dir], &[]))?;

        assert_eq!(result.good, vec![TestUnitId::new("test_d", dir.path())]);
        assert_eq!(output.contents(), "");
        Ok(())
    }

    #[test]
    fn broad_mode_runs_each_root_and_one_only_limits_it() -> Result<()> {
        let first = suite_dir(&["test_a", "test_d"])?;
        let second = suite_dir(&["test_a", "test_d"])?;
        let options = SuiteOptions {
            broad: true,
            quiet: true,
            one_only: strings(&["test_d.py"]),
            ..SuiteOptions::default()
        };

        let (result, _) = run(options, config_for(&[&first, &second], &[]))?;

        let mut expected = vec![
            TestUnitId::new("test_a", first.path()),
            TestUnitId::new("test_a", second.path()),
            TestUnitId::new("test_d", first.path()),
        ];
        expected.sort();

        assert!(result.multiple_roots);
        assert_eq!(result.good, expected);
        Ok(())
    }

    #[test]
    fn generate_with_verbose_is_rejected_before_running() {
        let options = SuiteOptions {
            generate: true,
            verbose: 1,
            ..SuiteOptions::default()
        };

        let result = run(options, SuiteConfig::default());
        assert!(matches!(
            result.map_err(|e| e.downcast::<Error>()),
            Err(Ok(Error::Configuration(_)))
        ));
    }

    #[test]
    fn raised_interrupt_reports_partial_results() -> Result<()> {
        let dir = suite_dir(&["test_a"])?;
        let interrupt = InterruptFlag::new();
        interrupt.raise();

        let (stdout, _) = OutputStream::in_memory();
        let result = Suite::new(
            SuiteOptions::default(),
            config_for(&[&dir], &[]),
            &HostFilesystem,
            Box::new(registry()),
            stdout,
        )
        .with_interrupt_flag(interrupt)
        .run()?;

        assert!(result.interrupted);
        assert!(result.good.is_empty());
        Ok(())
    }

    #[test]
    fn interrupt_signal_stops_the_loop() -> Result<()> {
        let dir = suite_dir(&["test_a", "test_b"])?;
        let mut registry = Registry::new();
        registry
            .register_fn("test_a", |_| Err(Signal::Interrupt))
            .register_fn("test_b", |_| Ok(()));

        let (stdout, _) = OutputStream::in_memory();
        let result = Suite::new(
            SuiteOptions::default(),
            config_for(&[&dir], &[]),
            &HostFilesystem,
            Box::new(registry),
            stdout,
        )
        .run()?;

        assert!(result.interrupted);
        assert!(result.good.is_empty() && result.bad.is_empty());
        Ok(())
    }

    #[test]
    fn find_leaks_without_detector_is_disabled() -> Result<()> {
        let dir = suite_dir(&[])?;
        let options = SuiteOptions {
            find_leaks: true,
            ..SuiteOptions::default()
        };

        let (_, output) = run(options, config_for(&[&dir], &[]))?;

        assert!(output
            .contents()
            .starts_with("No leak detector available, disabling findleaks.\n"));
        Ok(())
    }

    #[test]
    fn memo_is_saved() -> Result<()> {
        let dir = suite_dir(&["test_a", "test_b"])?;
        let memo_path = dir.path().join("memo.txt");
        let options = SuiteOptions {
            memo: Some(memo_path.clone()),
            quiet: true,
            ..SuiteOptions::default()
        };

        run(options, config_for(&[&dir], &[]))?;

        let memo = Memo::parse(&std::fs::read_to_string(memo_path)?)?;
        assert_eq!(
            memo,
            Memo {
                good: strings(&["test_a"]),
                bad: strings(&["test_b"]),
                skipped: vec![],
            }
        );
        Ok(())
    }
}
