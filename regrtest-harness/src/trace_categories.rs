//! Trace utilities

/// Trace category for output capture.
pub const CAPTURE: &str = "capture";
/// Trace category for configuration and argument files.
pub const CONFIG: &str = "config";
/// Trace category for test discovery.
pub const DISCOVERY: &str = "discovery";
/// Trace category for leak detection.
pub const LEAKS: &str = "leaks";
/// Trace category for running individual tests.
pub const RUNNER: &str = "runner";
/// Trace category for suite orchestration.
pub const SUITE: &str = "suite";
