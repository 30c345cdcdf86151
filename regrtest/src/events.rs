//! Diagnostic logging setup.

use std::{collections::HashSet, fmt::Display};

use regrtest_harness::trace_categories;
use tracing_subscriber::{
    Layer, filter::LevelFilter, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Type of event to trace.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, clap::ValueEnum)]
pub enum TraceEvent {
    /// Traces acquisition and release of output capture.
    #[clap(name = "capture")]
    Capture,
    /// Traces configuration loading and argument-file expansion.
    #[clap(name = "config")]
    Config,
    /// Traces test directory and test unit discovery.
    #[clap(name = "discovery")]
    Discovery,
    /// Traces leak detection.
    #[clap(name = "leaks")]
    Leaks,
    /// Traces loading, running and classifying individual tests.
    #[clap(name = "runner")]
    Runner,
    /// Traces suite orchestration.
    #[clap(name = "suite")]
    Suite,
}

impl TraceEvent {
    const fn target(self) -> &'static str {
        match self {
            Self::Capture => trace_categories::CAPTURE,
            Self::Config => trace_categories::CONFIG,
            Self::Discovery => trace_categories::DISCOVERY,
            Self::Leaks => trace_categories::LEAKS,
            Self::Runner => trace_categories::RUNNER,
            Self::Suite => trace_categories::SUITE,
        }
    }
}

impl Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.target())
    }
}

/// Which trace events are enabled or silenced.
#[derive(Debug, Default)]
pub struct TraceEventConfig {
    enabled: HashSet<TraceEvent>,
    disabled: HashSet<TraceEvent>,
}

impl TraceEventConfig {
    /// Installs a stderr subscriber honoring the given event selections.
    pub fn init(enabled: &[TraceEvent], disabled: &[TraceEvent]) -> Self {
        let config = Self {
            enabled: enabled.iter().copied().collect(),
            disabled: disabled.iter().copied().collect(),
        };

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .with_filter(config.compose_filter());

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            eprintln!("warning: failed to initialize tracing.");
        }

        config
    }

    fn compose_filter(&self) -> Targets {
        let mut filter = Targets::new().with_default(LevelFilter::INFO);

        for event in &self.enabled {
            filter = filter.with_target(event.target(), LevelFilter::DEBUG);
        }

        // Disabling wins over enabling.
        for event in &self.disabled {
            filter = filter.with_target(event.target(), LevelFilter::OFF);
        }

        filter
    }
}
