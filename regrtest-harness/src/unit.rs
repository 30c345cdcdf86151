//! Test unit identity, signals, and the capability a unit exposes to the runner.

use std::{
    fmt::Display,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    capture::OutputStream,
    loader::{ModuleTable, UnitLoader},
    resources::{Resource, ResourceSet},
};

/// Name of the directory, relative to a search root, holding golden files.
pub const GOLDEN_DIR_NAME: &str = "output";

/// Identifies one test unit: its name and the root it was found in.
///
/// Ordering is by name first so that result lists read alphabetically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestUnitId {
    name: String,
    source_root: PathBuf,
}

impl TestUnitId {
    /// Creates an identifier.
    pub fn new(name: impl Into<String>, source_root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_root: source_root.into(),
        }
    }

    /// The unit's name, unique within its root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directory the unit was found in.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Path of the golden file holding this unit's expected output.
    pub fn golden_path(&self) -> PathBuf {
        self.source_root.join(GOLDEN_DIR_NAME).join(&self.name)
    }

    /// Path of the unit's source file for the given extension.
    pub fn source_path(&self, extension: &str) -> PathBuf {
        crate::filesystem::source_file_path(&self.source_root, &self.name, extension)
    }

    /// Output a unit is assumed to produce when it has no golden file.
    pub fn baseline_output(&self) -> String {
        std::format!("{}\n", self.name)
    }

    /// Renders the unit for reports; the root is only shown when several are in play.
    pub fn display_name(&self, multiple_roots: bool) -> String {
        if multiple_roots {
            std::format!("[{}]{}", self.source_root.display(), self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Outcome signal raised while loading or running a test unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// The unit could not be loaded at all.
    LoadFailure(String),
    /// The unit declined to run.
    Skip(String),
    /// The operator asked for the whole run to stop.
    Interrupt,
    /// The unit reported an explicit failure.
    Failure(String),
    /// Anything else went wrong.
    Fault {
        /// Short classification of the fault.
        kind: String,
        /// Detail for the one-line summary.
        value: String,
        /// Full diagnostic trace, shown only in verbose mode.
        trace: Option<String>,
    },
}

impl Signal {
    /// Creates a fault signal with no trace.
    pub fn fault(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Fault {
            kind: kind.into(),
            value: value.into(),
            trace: None,
        }
    }
}

impl From<std::io::Error> for Signal {
    fn from(error: std::io::Error) -> Self {
        Self::fault("I/O error", error.to_string())
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadFailure(reason) => write!(f, "load failure: {reason}"),
            Self::Skip(reason) => write!(f, "skip: {reason}"),
            Self::Interrupt => write!(f, "interrupt"),
            Self::Failure(reason) => write!(f, "failure: {reason}"),
            Self::Fault { kind, value, .. } => write!(f, "{kind}: {value}"),
        }
    }
}

/// Result of running one test unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The unit ran and its output matched.
    Passed,
    /// The unit failed or its output did not match.
    Failed(String),
    /// The unit raised an unclassified fault.
    Crashed {
        /// Short classification of the fault.
        kind: String,
        /// Detail of the fault.
        value: String,
    },
    /// The unit did not run.
    Skipped(String),
}

/// A runnable test unit.
pub trait TestUnit {
    /// Loads the unit. For units without an entry point, loading is the run.
    fn load(&mut self, ctx: &mut TestContext<'_>) -> Result<(), Signal>;

    /// Runs the unit's explicit entry point, if it has one.
    fn entry_point(&mut self, _ctx: &mut TestContext<'_>) -> Option<Result<(), Signal>> {
        None
    }
}

/// What a running unit can see of the harness.
pub struct TestContext<'a> {
    stdout: OutputStream,
    verbose: u8,
    resources: &'a ResourceSet,
    unit: &'a TestUnitId,
    modules: &'a mut ModuleTable,
    loader: &'a mut dyn UnitLoader,
}

impl<'a> TestContext<'a> {
    pub(crate) fn new(
        stdout: OutputStream,
        verbose: u8,
        resources: &'a ResourceSet,
        unit: &'a TestUnitId,
        modules: &'a mut ModuleTable,
        loader: &'a mut dyn UnitLoader,
    ) -> Self {
        Self {
            stdout,
            verbose,
            resources,
            unit,
            modules,
            loader,
        }
    }

    /// Output stream the unit writes its observable output to.
    pub fn stdout(&mut self) -> &mut OutputStream {
        &mut self.stdout
    }

    /// Verbosity level of the run.
    pub const fn verbose(&self) -> u8 {
        self.verbose
    }

    /// Resources enabled for the run.
    pub const fn resources(&self) -> &ResourceSet {
        self.resources
    }

    /// The unit being run.
    pub const fn unit(&self) -> &TestUnitId {
        self.unit
    }

    /// Skips the unit unless the resource is enabled.
    pub fn requires(&self, resource: Resource) -> Result<(), Signal> {
        if self.resources.contains(resource) {
            Ok(())
        } else {
            Err(Signal::Skip(std::format!(
                "Use of the `{resource}' resource not enabled"
            )))
        }
    }

    /// Loads a sibling unit from the same root, once.
    ///
    /// Importing a unit that is still loading, such as the caller itself or a
    /// unit further up an import cycle, returns immediately.
    pub fn import(&mut self, name: &str) -> Result<(), Signal> {
        if self.modules.contains(name) || self.modules.is_loading(name) {
            return Ok(());
        }

        let id = TestUnitId::new(name, self.unit.source_root());
        let mut unit = self.loader.load(&id)?;

        self.modules.begin_loading(name);
        let result = {
            let mut nested = TestContext::new(
                self.stdout.clone(),
                self.verbose,
                self.resources,
                &id,
                &mut *self.modules,
                &mut *self.loader,
            );
            unit.load(&mut nested)
        };
        self.modules.finish_loading(name);
        result?;

        tracing::debug!(target: crate::trace_categories::RUNNER, "{} imported {name}", self.unit.name());
        self.modules.insert(name, unit);
        Ok(())
    }

    /// Writes a line to the unit's output.
    pub fn print(&mut self, line: impl Display) -> Result<(), Signal> {
        writeln!(self.stdout, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Registry;
    use pretty_assertions::assert_eq;

    #[test]
    fn golden_path_is_under_output_dir() {
        let id = TestUnitId::new("test_grammar", "/suite/test");
        assert_eq!(id.golden_path(), PathBuf::from("/suite/test/output/test_grammar"));
        assert_eq!(id.source_path("py"), PathBuf::from("/suite/test/test_grammar.py"));
    }

    #[test]
    fn display_name_shows_root_only_with_several_roots() {
        let id = TestUnitId::new("test_a", "lib");
        assert_eq!(id.display_name(false), "test_a");
        assert_eq!(id.display_name(true), "[lib]test_a");
    }

    #[test]
    fn ids_sort_by_name_first() {
        let mut ids = vec![
            TestUnitId::new("test_b", "a"),
            TestUnitId::new("test_a", "z"),
            TestUnitId::new("test_a", "b"),
        ];
        ids.sort();

        assert_eq!(
            ids,
            vec![
                TestUnitId::new("test_a", "b"),
                TestUnitId::new("test_a", "z"),
                TestUnitId::new("test_b", "a"),
            ]
        );
    }

    #[test]
    fn requires_skips_without_resource() {
        let resources = ResourceSet::default();
        let id = TestUnitId::new("test_net", ".");
        let mut modules = ModuleTable::default();
        let mut loader = Registry::new();
        let (stdout, _) = OutputStream::in_memory();

        let ctx = TestContext::new(stdout, 0, &resources, &id, &mut modules, &mut loader);

        assert_eq!(
            ctx.requires(Resource::Network),
            Err(Signal::Skip(
                "Use of the `network' resource not enabled".to_owned()
            ))
        );
    }

    #[test]
    fn import_loads_sibling_once() {
        let resources = ResourceSet::default();
        let id = TestUnitId::new("test_main", ".");
        let mut modules = ModuleTable::default();
        let mut loader = Registry::new();
        loader.register_fn("helper", |ctx| ctx.print("helper loaded"));
        let (stdout, output) = OutputStream::in_memory();

        let mut ctx = TestContext::new(stdout, 0, &resources, &id, &mut modules, &mut loader);
        assert_eq!(ctx.import("helper"), Ok(()));
        assert_eq!(ctx.import("helper"), Ok(()));

        assert_eq!(output.contents(), "helper loaded\n");
        assert!(modules.contains("helper"));
    }

    #[test]
    fn import_of_unknown_unit_is_load_failure() {
        let resources = ResourceSet::default();
        let id = TestUnitId::new("test_main", ".");
        let mut modules = ModuleTable::default();
        let mut loader = Registry::new();
        let (stdout, _) = OutputStream::in_memory();

        let mut ctx = TestContext::new(stdout, 0, &resources, &id, &mut modules, &mut loader);
        assert!(matches!(ctx.import("missing"), Err(Signal::LoadFailure(_))));
    }
}
