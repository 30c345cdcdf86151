//! Regression test driver library.
//!
//! Discovers test units in one or more test directories, runs each one with its
//! standard output captured, and compares what it printed against a golden file
//! stored under `<test dir>/output/<name>`. Outcomes are collected into passed,
//! failed and skipped lists, and skips are reconciled against a per-platform
//! table of tests that are expected not to run.
//!
//! Test units are supplied through a [`UnitLoader`]: [`Registry`] runs
//! in-process units, and [`ScriptLoader`] runs each unit's source file as a
//! child process.

mod argfile;
mod capture;
mod config;
mod discovery;
mod error;
mod execution;
mod expectations;
mod filesystem;
mod leaks;
mod loader;
mod memo;
mod reporting;
mod resources;
mod runner;
mod suite;
pub mod support;
mod textdiff;
pub mod trace_categories;
mod unit;

pub use argfile::{INDIRECT_ARG_PREFIX, expand_indirect_args, parse_argument_text};
pub use capture::{MemoryOutput, OutputCapture, OutputStream};
pub use config::{
    DEFAULT_SOURCE_EXTENSION, DiscoveryConfig, NOT_TESTS, STANDARD_TESTS, SuiteConfig,
    SuiteOptions,
};
pub use discovery::{
    TEST_NAME_PREFIX, apply_exclusions, find_all_tests, find_test_dirs, find_tests,
    shuffle_tests, strip_source_extension,
};
pub use error::{CaptureError, ConfigurationError, Error, FilesystemError, MemoError};
pub use execution::{
    FAILURE_EXIT_CODE, SKIP_EXIT_CODE, ScriptLoader, TEST_NAME_ENV_VAR, USE_RESOURCES_ENV_VAR,
    VERBOSE_ENV_VAR,
};
pub use expectations::{ExpectedSkips, current_platform};
pub use filesystem::{Filesystem, HostFilesystem};
pub use leaks::{LeakDetector, LeftoverFileDetector};
pub use loader::{ModuleTable, Registry, UnitLoader};
pub use memo::Memo;
pub use reporting::{Painter, SummaryStyle, count, write_list, write_summary};
pub use resources::{Resource, ResourceSet};
pub use runner::{RunnerSettings, TestRunner};
pub use suite::{InterruptFlag, Phase, Suite, SuiteResult};
pub use textdiff::{OpTag, Opcode, SequenceMatcher, line_opcodes, split_lines, write_report};
pub use unit::{GOLDEN_DIR_NAME, RunOutcome, Signal, TestContext, TestUnit, TestUnitId};
