//! Configuration types for a suite run.

use std::path::PathBuf;

use crate::error::ConfigurationError;
use crate::resources::ResourceSet;

/// Source-file extension of test units when nothing else is configured.
pub const DEFAULT_SOURCE_EXTENSION: &str = "py";

/// Tests that always run first, in this order, unless explicitly excluded.
pub const STANDARD_TESTS: &[&str] = &[
    "test_grammar",
    "test_opcodes",
    "test_operations",
    "test_builtin",
    "test_exceptions",
    "test_types",
];

/// Files that look like tests but are not.
pub const NOT_TESTS: &[&str] = &[
    "test_support",
    "test_b1",
    "test_b2",
    "test_future1",
    "test_future2",
    "test_future3",
];

/// Where and how test units are discovered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Candidate test directories, in search order.
    pub search_path: Vec<PathBuf>,
    /// Extension (without the dot) of test unit source files.
    pub source_extension: String,
    /// Tests that run first, in order.
    pub standard_tests: Vec<String>,
    /// Names that are never treated as tests.
    pub excluded_tests: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_path: vec![PathBuf::from("test")],
            source_extension: DEFAULT_SOURCE_EXTENSION.to_owned(),
            standard_tests: STANDARD_TESTS.iter().map(|s| (*s).to_owned()).collect(),
            excluded_tests: NOT_TESTS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Environment-level configuration for a suite run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuiteConfig {
    /// Discovery settings.
    pub discovery: DiscoveryConfig,
    /// Platform identifier used to look up expected skips.
    pub platform: String,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            platform: crate::expectations::current_platform().to_owned(),
        }
    }
}

/// Options selected by the operator for a single run.
#[derive(Clone, Debug, Default)]
pub struct SuiteOptions {
    /// Verbosity level; output is neither captured nor compared when non-zero.
    pub verbose: u8,
    /// Only report failures.
    pub quiet: bool,
    /// Write golden files instead of comparing against them.
    pub generate: bool,
    /// Treat `tests` as names to exclude rather than names to run.
    pub exclude: bool,
    /// Shuffle the execution order.
    pub randomize: bool,
    /// Seed for the shuffle; a random seed is chosen when absent.
    pub random_seed: Option<u64>,
    /// Report files left behind by tests.
    pub find_leaks: bool,
    /// Resources tests may use.
    pub use_resources: ResourceSet,
    /// Search every qualifying test directory rather than only the first.
    pub broad: bool,
    /// Where to save the categorized results, if anywhere.
    pub memo: Option<PathBuf>,
    /// Tests to run only in the first test directory.
    pub one_only: Vec<String>,
    /// Test names given on the command line.
    pub tests: Vec<String>,
    /// Colorize operator-facing report lines.
    pub color: bool,
}

impl SuiteOptions {
    /// Checks that the selected options can be honored together.
    pub const fn validate(&self) -> Result<(), ConfigurationError> {
        if self.generate && self.verbose > 0 {
            return Err(ConfigurationError::IncompatibleOptions(
                "-g and -v don't go together!",
            ));
        }

        Ok(())
    }

    /// Returns whether test output is captured and compared.
    pub const fn captures_output(&self) -> bool {
        self.verbose == 0
    }
}
