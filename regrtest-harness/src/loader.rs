//! Loading test units, and tracking which ones are loaded.

use std::collections::{BTreeMap, BTreeSet};

use crate::unit::{Signal, TestContext, TestUnit, TestUnitId};

/// Turns a test unit identifier into something runnable.
pub trait UnitLoader {
    /// Loads the named unit; failure to find or prepare it is a [`Signal::LoadFailure`].
    fn load(&mut self, unit: &TestUnitId) -> Result<Box<dyn TestUnit>, Signal>;
}

type UnitFactory = Box<dyn Fn() -> Box<dyn TestUnit>>;

/// In-process loader mapping unit names to factories.
#[derive(Default)]
pub struct Registry {
    factories: BTreeMap<String, UnitFactory>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory producing fresh instances of a unit.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn TestUnit> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Registers a unit whose whole run is the given function.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(&mut TestContext<'_>) -> Result<(), Signal> + Clone + 'static,
    {
        self.register(name, move || Box::new(FnUnit(body.clone())))
    }

    /// Names of all registered units.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl UnitLoader for Registry {
    fn load(&mut self, unit: &TestUnitId) -> Result<Box<dyn TestUnit>, Signal> {
        self.factories
            .get(unit.name())
            .map(|factory| factory())
            .ok_or_else(|| Signal::LoadFailure(std::format!("no unit named {}", unit.name())))
    }
}

struct FnUnit<F>(F);

impl<F> TestUnit for FnUnit<F>
where
    F: Fn(&mut TestContext<'_>) -> Result<(), Signal>,
{
    fn load(&mut self, ctx: &mut TestContext<'_>) -> Result<(), Signal> {
        (self.0)(ctx)
    }
}

/// Units currently loaded, by name.
#[derive(Default)]
pub struct ModuleTable {
    loaded: BTreeMap<String, Box<dyn TestUnit>>,
    loading: BTreeSet<String>,
}

impl ModuleTable {
    /// Returns whether a unit with the given name is loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    /// Returns whether the named unit is part-way through loading.
    pub fn is_loading(&self, name: &str) -> bool {
        self.loading.contains(name)
    }

    /// Marks the named unit as loading, so re-entrant imports of it end at once.
    pub(crate) fn begin_loading(&mut self, name: &str) {
        self.loading.insert(name.to_owned());
    }

    /// Clears the loading mark set by [`ModuleTable::begin_loading`].
    pub(crate) fn finish_loading(&mut self, name: &str) {
        self.loading.remove(name);
    }

    /// Records a loaded unit, replacing any previous load of the same name.
    pub fn insert(&mut self, name: impl Into<String>, unit: Box<dyn TestUnit>) {
        self.loaded.insert(name.into(), unit);
    }

    /// Drops any record of the named unit; a no-op if it was never loaded.
    pub fn forget(&mut self, name: &str) {
        if self.loaded.remove(name).is_some() {
            tracing::debug!(target: crate::trace_categories::RUNNER, "forgot stale load of {name}");
        }
    }

    /// Snapshot of the loaded names.
    pub fn names(&self) -> BTreeSet<String> {
        self.loaded.keys().cloned().collect()
    }

    /// Unloads test units loaded since the baseline snapshot, returning their names.
    ///
    /// Only names that look like tests (`test_*` or `test.*`) are unloaded;
    /// helpers stay loaded for the rest of the run.
    pub fn unload_new(&mut self, baseline: &BTreeSet<String>) -> Vec<String> {
        let unloaded: Vec<String> = self
            .loaded
            .keys()
            .filter(|name| !baseline.contains(*name))
            .filter(|name| name.starts_with("test_") || name.starts_with("test."))
            .cloned()
            .collect();

        for name in &unloaded {
            self.loaded.remove(name);
        }

        unloaded
    }
}

impl std::fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.loaded.keys()).finish()
    }
}
