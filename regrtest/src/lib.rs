//! Command-line driver for golden-output regression test suites.

pub mod args;
pub mod config;
pub mod entry;
pub mod events;
mod productinfo;
