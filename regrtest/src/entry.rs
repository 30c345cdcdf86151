//! Implements the command-line interface for the `regrtest` driver.

use clap::{CommandFactory, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;

use regrtest_harness::{
    ConfigurationError, HostFilesystem, InterruptFlag, LeftoverFileDetector, OutputStream,
    ScriptLoader, Suite, expand_indirect_args, trace_categories,
};

use crate::args::CommandLineArgs;
use crate::config::{self, ConfigLoadError};
use crate::events;
use crate::productinfo;

/// Exit code for usage and configuration errors.
const USAGE_EXIT_CODE: u8 = 2;

/// Exit code used when a second interrupt arrives before the run winds down.
const FORCED_EXIT_CODE: i32 = 130;

/// Errors that stop the driver before or during a suite run.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Usage(#[from] ConfigurationError),

    #[error("{}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: ConfigLoadError,
    },

    #[error("failed to start signal handling: {0}")]
    Runtime(std::io::Error),

    #[error(transparent)]
    Suite(regrtest_harness::Error),
}

impl From<regrtest_harness::Error> for CliError {
    fn from(err: regrtest_harness::Error) -> Self {
        match err {
            regrtest_harness::Error::Configuration(inner) => Self::Usage(inner),
            other => Self::Suite(other),
        }
    }
}

impl CliError {
    const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) | Self::Config { .. } => USAGE_EXIT_CODE,
            Self::Runtime(_) | Self::Suite(_) => 1,
        }
    }
}

/// Main entry point for the `regrtest` driver.
pub fn run() {
    //
    // Install panic handlers to clean up on panic.
    //
    install_panic_handlers();

    //
    // Expand @file arguments, then parse.
    //
    let mut raw_args = std::env::args();
    let program = raw_args
        .next()
        .unwrap_or_else(|| productinfo::PRODUCT_NAME.to_owned());

    let args = match expand_indirect_args(raw_args, &HostFilesystem) {
        Ok(args) => std::iter::once(program).chain(args),
        Err(err) => {
            let code = report_error(&CliError::Usage(err));
            std::process::exit(i32::from(code));
        }
    };

    let parsed_args = match CommandLineArgs::try_parse_from(args) {
        Ok(parsed_args) => parsed_args,
        Err(e) => {
            let _ = e.print();

            // clap returns errors for `--help` and `--version` too.
            let exit_code = match e.kind() {
                clap::error::ErrorKind::DisplayVersion | clap::error::ErrorKind::DisplayHelp => 0,
                _ => USAGE_EXIT_CODE,
            };

            std::process::exit(i32::from(exit_code));
        }
    };

    //
    // Initialize tracing.
    //
    let _event_config =
        events::TraceEventConfig::init(&parsed_args.enabled_debug_events, &parsed_args.disabled_events);

    let use_color = match parsed_args.color {
        clap::ColorChoice::Always => true,
        clap::ColorChoice::Never => false,
        clap::ColorChoice::Auto => std::io::stdout().is_terminal(),
    };
    colored::control::set_override(use_color);

    //
    // Run.
    //
    let exit_code = match run_suite(&parsed_args, use_color) {
        Ok(code) => code,
        Err(err) => report_error(&err),
    };

    std::process::exit(i32::from(exit_code));
}

/// Installs a panic handler that reports a human-readable message on release builds.
fn install_panic_handlers() {
    human_panic::setup_panic!(human_panic::Metadata::new(
        productinfo::PRODUCT_NAME,
        productinfo::PRODUCT_VERSION
    ));
}

/// Runs the suite described by the arguments and configuration. Returns the exit code.
///
/// # Arguments
///
/// * `args` - The parsed command-line arguments.
/// * `use_color` - Whether reports should be colored.
fn run_suite(args: &CommandLineArgs, use_color: bool) -> Result<u8, CliError> {
    let options = args.to_suite_options(use_color)?;

    let loaded = config::load_config(args.no_config, args.config_file.as_deref());
    if let Some(error) = loaded.error {
        let path = loaded.path.unwrap_or_default();
        if loaded.explicit_path {
            return Err(CliError::Config {
                path,
                source: error,
            });
        }

        tracing::warn!(
            target: trace_categories::CONFIG,
            "ignoring configuration file {}: {error}",
            path.display()
        );
    }

    let file_config = loaded.config;
    let suite_config = file_config.to_suite_config(args);
    let fs = HostFilesystem;
    let loader = ScriptLoader::new(
        &fs,
        file_config.interpreter(),
        suite_config.discovery.source_extension.clone(),
    );

    // Interrupts are watched on a background runtime; tests run on this thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let interrupt = InterruptFlag::new();
    runtime.spawn(watch_for_interrupts(interrupt.clone()));

    let mut suite = Suite::new(
        options,
        suite_config,
        &fs,
        Box::new(loader),
        OutputStream::stdout(),
    )
    .with_interrupt_flag(interrupt);

    if let Some(dir) = &file_config.runner.scratch_dir {
        suite = suite.with_leak_detector(Box::new(LeftoverFileDetector::new(dir)));
    }

    let result = suite.run();
    runtime.shutdown_background();

    Ok(result?.exit_code())
}

/// Raises the interrupt flag on the first Ctrl-C; exits on the second.
async fn watch_for_interrupts(interrupt: InterruptFlag) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }

    tracing::warn!(
        target: trace_categories::SUITE,
        "interrupt received; stopping after the current test"
    );
    interrupt.raise();

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(FORCED_EXIT_CODE);
    }
}

/// Displays an error to the operator. Returns the exit code to use.
fn report_error(err: &CliError) -> u8 {
    match err {
        CliError::Usage(_) | CliError::Config { .. } => {
            let prefix = if std::io::stderr().is_terminal() {
                color_print::cstr!("<red,bold>error:</>")
            } else {
                "error:"
            };

            eprintln!("{prefix} {err}");
            eprintln!();
            eprintln!("{}", CommandLineArgs::command().render_usage());
        }
        _ => tracing::error!("error: {err}"),
    }

    err.exit_code()
}
