//! Command-line argument parsing.

use clap::{Parser, builder::styling};
use std::path::PathBuf;

use regrtest_harness::{ConfigurationError, ResourceSet, SuiteOptions};

use crate::{events, productinfo};

const SHORT_DESCRIPTION: &str = "Run regression tests and compare their output to golden files";

const LONG_DESCRIPTION: &str = r"
Runs each named test (or every test found in the test directories) with its
standard output captured, then compares what it printed against the expected
output stored in the test directory's `output/` folder.

Any argument of the form @FILE is replaced by the whitespace-separated words of
FILE; double quotes group words containing spaces.
";

const VERSION: &str = const_format::concatcp!(
    productinfo::PRODUCT_VERSION,
    " (",
    productinfo::PRODUCT_GIT_VERSION,
    ")"
);

/// Parsed command-line arguments for the regression test driver.
#[derive(Parser, Debug)]
#[clap(name = productinfo::PRODUCT_NAME,
       version = VERSION,
       about = SHORT_DESCRIPTION,
       long_about = LONG_DESCRIPTION,
       disable_help_flag = true,
       disable_version_flag = true,
       styles = regrtest_help_styles())]
#[allow(clippy::module_name_repetitions)]
#[allow(clippy::struct_excessive_bools)]
pub struct CommandLineArgs {
    /// Display usage information.
    #[clap(short = 'h', long = "help", action = clap::ArgAction::HelpLong)]
    pub help: Option<bool>,

    /// Display version.
    #[clap(long = "version", action = clap::ArgAction::Version)]
    pub version: Option<bool>,

    /// Run tests in verbose mode, with output to stdout; repeat for more detail.
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Don't print the skipped-test list, and print nothing for passing tests.
    #[clap(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Write the output file for each test instead of comparing against it.
    #[clap(short = 'g', long = "generate")]
    pub generate: bool,

    /// Run every discovered test except the ones named.
    #[clap(short = 'x', long = "exclude")]
    pub exclude: bool,

    /// Run the selected tests in random order.
    #[clap(short = 'r', long = "random", alias = "randomize")]
    pub randomize: bool,

    /// Seed for the random order; implies --random.
    #[clap(long = "seed", value_name = "SEED")]
    pub seed: Option<u64>,

    /// Look for files or objects left behind by each test.
    #[clap(short = 'l', long = "findleaks")]
    pub find_leaks: bool,

    /// Enable optional resources (comma-separated; `all` enables every one, `-name` removes one).
    #[clap(short = 'u', long = "use", value_name = "RESOURCES", allow_hyphen_values = true)]
    pub use_resources: Vec<String>,

    /// Search for tests in nested test directories as well.
    #[clap(short = 'a', long = "all", alias = "broad")]
    pub broad: bool,

    /// Save the good/bad/skipped lists to FILE when done.
    #[clap(short = 'm', long = "memo", value_name = "FILE")]
    pub memo: Option<PathBuf>,

    /// Restrict a broad run to the named tests (comma-separated).
    #[clap(long = "oneonly", value_name = "NAMES", value_delimiter = ',')]
    pub one_only: Vec<String>,

    /// Directory to search for tests; may be repeated.
    #[clap(long = "testdir", value_name = "DIR")]
    pub test_dirs: Vec<PathBuf>,

    /// Platform whose expected-skip table is used.
    #[clap(long = "platform", value_name = "NAME")]
    pub platform: Option<String>,

    /// Path to a configuration file.
    #[clap(long = "config", value_name = "FILE", env = "REGRTEST_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Don't load any configuration file.
    #[clap(long = "no-config")]
    pub no_config: bool,

    /// When to use color in reports.
    #[clap(long = "color", value_name = "WHEN", default_value_t = clap::ColorChoice::Auto)]
    pub color: clap::ColorChoice,

    /// Enable debug logging for classes of tracing events.
    #[clap(long = "debug", alias = "log-enable", value_name = "EVENT")]
    pub enabled_debug_events: Vec<events::TraceEvent>,

    /// Disable logging for classes of tracing events.
    #[clap(long = "disable-event", alias = "log-disable", value_name = "EVENT")]
    pub disabled_events: Vec<events::TraceEvent>,

    /// Names of tests to run.
    #[clap(value_name = "TEST")]
    pub tests: Vec<String>,
}

impl CommandLineArgs {
    /// Translates the parsed arguments into options for a suite run.
    ///
    /// # Arguments
    ///
    /// * `use_color` - Whether reports should be colored.
    pub fn to_suite_options(&self, use_color: bool) -> Result<SuiteOptions, ConfigurationError> {
        let mut use_resources = ResourceSet::default();
        for value in &self.use_resources {
            use_resources.apply_use_option(value)?;
        }

        Ok(SuiteOptions {
            // Quiet mode overrides verbosity.
            verbose: if self.quiet { 0 } else { self.verbose },
            quiet: self.quiet,
            generate: self.generate,
            exclude: self.exclude,
            randomize: self.randomize || self.seed.is_some(),
            random_seed: self.seed,
            find_leaks: self.find_leaks,
            use_resources,
            broad: self.broad,
            memo: self.memo.clone(),
            one_only: self.one_only.clone(),
            tests: self.tests.clone(),
            color: use_color,
        })
    }
}

fn regrtest_help_styles() -> clap::builder::Styles {
    styling::Styles::styled()
        .header(
            styling::AnsiColor::Yellow.on_default()
                | styling::Effects::BOLD
                | styling::Effects::UNDERLINE,
        )
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::AnsiColor::Magenta.on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default())
}
