//! Configuration file support for the regression test driver.
//!
//! Settings are layered: built-in defaults, then the TOML configuration file,
//! then command-line arguments. Unknown fields in the file are ignored.

use etcetera::BaseStrategy;
use std::path::{Path, PathBuf};

use regrtest_harness::{DiscoveryConfig, SuiteConfig};

use crate::args::CommandLineArgs;

/// Root configuration structure.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where and how tests are discovered.
    pub discovery: DiscoveryFileConfig,

    /// How test units are executed.
    pub runner: RunnerConfig,

    /// Expected-skip reconciliation.
    pub expectations: ExpectationsConfig,
}

/// Discovery configuration options.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct DiscoveryFileConfig {
    /// Directories searched for test units.
    #[serde(rename = "search-path")]
    pub search_path: Option<Vec<PathBuf>>,

    /// File extension of test unit sources, without the dot.
    #[serde(rename = "source-extension")]
    pub source_extension: Option<String>,

    /// Tests always run first, in order.
    #[serde(rename = "standard-tests")]
    pub standard_tests: Option<Vec<String>>,

    /// Names that look like tests but are not.
    #[serde(rename = "excluded-tests")]
    pub excluded_tests: Option<Vec<String>>,
}

/// Runner configuration options.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Command (program plus leading arguments) used to run a unit's source file.
    /// When absent, source files are executed directly.
    pub interpreter: Option<Vec<String>>,

    /// Directory watched for files left behind by tests when `--findleaks` is given.
    #[serde(rename = "scratch-dir")]
    pub scratch_dir: Option<PathBuf>,
}

/// Expected-skip configuration options.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ExpectationsConfig {
    /// Platform whose expected-skip table applies.
    pub platform: Option<String>,
}

impl Config {
    /// Builds the suite configuration, with command-line arguments taking
    /// precedence over file settings, which take precedence over defaults.
    ///
    /// # Arguments
    ///
    /// * `args` - The parsed command-line arguments.
    #[must_use]
    pub fn to_suite_config(&self, args: &CommandLineArgs) -> SuiteConfig {
        let defaults = SuiteConfig::default();
        let file = &self.discovery;

        // Explicit test directories are searched before the configured ones.
        let mut search_path = args.test_dirs.clone();
        search_path.extend(
            file.search_path
                .clone()
                .unwrap_or(defaults.discovery.search_path),
        );

        SuiteConfig {
            discovery: DiscoveryConfig {
                search_path,
                source_extension: file
                    .source_extension
                    .clone()
                    .unwrap_or(defaults.discovery.source_extension),
                standard_tests: file
                    .standard_tests
                    .clone()
                    .unwrap_or(defaults.discovery.standard_tests),
                excluded_tests: file
                    .excluded_tests
                    .clone()
                    .unwrap_or(defaults.discovery.excluded_tests),
            },
            platform: args
                .platform
                .clone()
                .or_else(|| self.expectations.platform.clone())
                .unwrap_or(defaults.platform),
        }
    }

    /// Returns the command used to run unit source files.
    pub fn interpreter(&self) -> Vec<String> {
        self.runner.interpreter.clone().unwrap_or_default()
    }
}

/// Result of attempting to load a configuration file.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration, or default if loading failed.
    pub config: Config,

    /// The path that was used (or attempted) for loading.
    pub path: Option<PathBuf>,

    /// Any error that occurred during loading.
    pub error: Option<ConfigLoadError>,

    /// Whether the path was explicitly provided by the user (via `--config`).
    pub explicit_path: bool,
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the TOML content.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Returns the default configuration file path for the current platform.
///
/// Returns `None` if the platform's config directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("regrtest").join("config.toml"))
}

/// Loads configuration from the specified path.
///
/// This function sets `explicit_path` to `false`; see [`load_config`].
pub fn load_from_path(path: &Path) -> ConfigLoadResult {
    let parsed = std::fs::read_to_string(path)
        .map_err(ConfigLoadError::from)
        .and_then(|content| toml::from_str::<Config>(&content).map_err(ConfigLoadError::from));

    let (config, error) = match parsed {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    ConfigLoadResult {
        config,
        path: Some(path.to_path_buf()),
        error,
        explicit_path: false,
    }
}

/// Loads configuration based on the provided options.
///
/// # Arguments
///
/// * `disabled` - If true, skip loading and return defaults.
/// * `explicit_path` - If provided, use this path instead of the default.
///
/// A missing file at the default path is not an error.
pub fn load_config(disabled: bool, explicit_path: Option<&Path>) -> ConfigLoadResult {
    let defaults = |path| ConfigLoadResult {
        config: Config::default(),
        path,
        error: None,
        explicit_path: false,
    };

    if disabled {
        return defaults(None);
    }

    let is_explicit = explicit_path.is_some();

    let Some(path) = explicit_path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
    else {
        return defaults(None);
    };

    if !is_explicit && !path.exists() {
        return defaults(Some(path));
    }

    tracing::debug!(
        target: regrtest_harness::trace_categories::CONFIG,
        "loading configuration from {}",
        path.display()
    );

    let mut result = load_from_path(&path);
    result.explicit_path = is_explicit;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn make_test_args(extra: &[&str]) -> CommandLineArgs {
        CommandLineArgs::try_parse_from(std::iter::once("regrtest").chain(extra.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.discovery.search_path.is_none());
        assert!(config.runner.interpreter.is_none());
        assert!(config.expectations.platform.is_none());
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
            [discovery]
            search-path = ["suite", "more"]
            source-extension = "sh"
            standard-tests = ["test_first"]
            excluded-tests = ["test_helper"]

            [runner]
            interpreter = ["sh", "-e"]
            scratch-dir = "/tmp/scratch"

            [expectations]
            platform = "linux"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.discovery.search_path,
            Some(vec![PathBuf::from("suite"), PathBuf::from("more")])
        );
        assert_eq!(config.discovery.source_extension.as_deref(), Some("sh"));
        assert_eq!(config.interpreter(), vec!["sh", "-e"]);
        assert_eq!(
            config.runner.scratch_dir,
            Some(PathBuf::from("/tmp/scratch"))
        );
        assert_eq!(config.expectations.platform.as_deref(), Some("linux"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let toml = r#"
            [discovery]
            source-extension = "sh"
            unknown-field = 42

            [unknown-section]
            foo = "bar"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.discovery.source_extension.as_deref(), Some("sh"));
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("regrtest/config.toml"));
        }
    }

    #[test]
    fn test_load_config_disabled() {
        let result = load_config(true, None);
        assert!(result.path.is_none());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_load_config_nonexistent_explicit() {
        let path = Path::new("/nonexistent/path/to/config.toml");
        let result = load_config(false, Some(path));
        assert!(result.explicit_path);
        assert!(matches!(result.error, Some(ConfigLoadError::Io(_))));
    }

    #[test]
    fn test_load_config_parse_error() -> anyhow::Result<()> {
        let temp_dir = assert_fs::TempDir::new()?;
        let file = temp_dir.child("config.toml");
        file.write_str("[discovery\n")?;

        let result = load_config(false, Some(file.path()));
        assert!(matches!(result.error, Some(ConfigLoadError::Parse(_))));
        assert!(result.config.discovery.search_path.is_none());

        Ok(())
    }

    #[test]
    fn test_defaults_only() {
        let suite = Config::default().to_suite_config(&make_test_args(&[]));
        assert_eq!(suite, SuiteConfig::default());
    }

    #[test]
    fn test_config_overrides_defaults() {
        let config: Config = toml::from_str(
            r#"
            [discovery]
            search-path = ["suite"]
            source-extension = "sh"

            [expectations]
            platform = "freebsd"
            "#,
        )
        .unwrap();

        let suite = config.to_suite_config(&make_test_args(&[]));
        assert_eq!(suite.discovery.search_path, vec![PathBuf::from("suite")]);
        assert_eq!(suite.discovery.source_extension, "sh");
        assert_eq!(suite.platform, "freebsd");
    }

    #[test]
    fn test_cli_takes_precedence_over_config() {
        let config: Config = toml::from_str(
            r#"
            [discovery]
            search-path = ["suite"]

            [expectations]
            platform = "freebsd"
            "#,
        )
        .unwrap();

        let args = make_test_args(&["--testdir", "a", "--testdir", "b", "--platform", "macos"]);
        let suite = config.to_suite_config(&args);
        assert_eq!(
            suite.discovery.search_path,
            vec![
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("suite")
            ]
        );
        assert_eq!(suite.platform, "macos");
    }
}
