//! Command-line driver for golden-output regression test suites.

fn main() {
    regrtest_cli::entry::run();
}
