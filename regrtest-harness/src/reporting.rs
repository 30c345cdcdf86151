//! Operator-facing report text.

use std::io::Write;

use colored::Colorize;

use crate::{expectations::ExpectedSkips, suite::SuiteResult};

/// Maximum width of a wrapped name list.
const LIST_WIDTH: usize = 70;

/// Indentation of a wrapped name list.
const LIST_INDENT: usize = 4;

/// Applies color to report text when enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct Painter {
    use_color: bool,
}

impl Painter {
    /// Creates a painter.
    pub const fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    /// Creates a painter that never colors.
    pub const fn plain() -> Self {
        Self::new(false)
    }

    fn paint(&self, text: &str, style: fn(&str) -> colored::ColoredString) -> String {
        if self.use_color {
            style(text).to_string()
        } else {
            text.to_owned()
        }
    }

    /// Styles text reporting success.
    pub fn success(&self, text: &str) -> String {
        self.paint(text, |s| s.bright_green())
    }

    /// Styles text reporting failure.
    pub fn failure(&self, text: &str) -> String {
        self.paint(text, |s| s.bright_red())
    }

    /// Styles text reporting something skipped or otherwise notable.
    pub fn notice(&self, text: &str) -> String {
        self.paint(text, |s| s.bright_yellow())
    }

    /// Styles a diff line present only in the expected output.
    pub fn removed(&self, text: &str) -> String {
        self.paint(text, |s| s.red())
    }

    /// Styles a diff line present only in the actual output.
    pub fn added(&self, text: &str) -> String {
        self.paint(text, |s| s.green())
    }

    /// Styles a diff line common to both sides.
    pub fn unchanged(&self, text: &str) -> String {
        self.paint(text, |s| s.bright_black())
    }
}

/// Formats `n` followed by `word`, pluralized when `n != 1`.
pub fn count(n: usize, word: &str) -> String {
    if n == 1 {
        std::format!("{n} {word}")
    } else {
        std::format!("{n} {word}s")
    }
}

/// Writes names separated by spaces, wrapped to 70 columns with a 4-space indent.
pub fn write_list<I, S>(writer: &mut impl Write, items: I) -> std::io::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let indent = " ".repeat(LIST_INDENT);
    let mut line = indent.clone();

    for item in items {
        let item = item.as_ref();
        let pad = if line.ends_with(' ') { "" } else { " " };

        if line.len() + pad.len() + item.len() > LIST_WIDTH {
            writeln!(writer, "{line}")?;
            line = std::format!("{indent}{item}");
        } else {
            line.push_str(pad);
            line.push_str(item);
        }
    }

    if line.len() > LIST_INDENT {
        writeln!(writer, "{line}")?;
    }

    Ok(())
}

/// Options affecting the end-of-run summary.
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryStyle {
    /// Verbosity of the run.
    pub verbose: u8,
    /// Only failures are reported.
    pub quiet: bool,
    /// Coloring of headline lines.
    pub painter: Painter,
}

/// Writes the end-of-run summary: counts, name lists and skip reconciliation.
pub fn write_summary(
    writer: &mut impl Write,
    result: &SuiteResult,
    expectations: &ExpectedSkips,
    style: &SummaryStyle,
) -> std::io::Result<()> {
    let painter = &style.painter;
    let multiple_roots = result.multiple_roots;

    if result.interrupted {
        writeln!(writer, "{}", painter.notice("Interrupted; results are partial."))?;
    }

    if !result.good.is_empty() && !style.quiet {
        let all = if result.bad.is_empty() && result.skipped.is_empty() && result.good.len() > 1 {
            "All "
        } else {
            ""
        };

        writeln!(
            writer,
            "{}",
            painter.success(&std::format!("{all}{} OK.", count(result.good.len(), "test")))
        )?;

        if style.verbose > 0 {
            writeln!(writer, "CAUTION:  stdout isn't compared in verbose mode:  a test")?;
            writeln!(writer, "that passes in verbose mode may fail without it.")?;
        }
    }

    if !result.bad.is_empty() {
        writeln!(
            writer,
            "{}",
            painter.failure(&std::format!("{} failed:", count(result.bad.len(), "test")))
        )?;
        write_list(writer, result.bad.iter().map(|t| t.display_name(multiple_roots)))?;
    }

    if !result.skipped.is_empty() && !style.quiet {
        writeln!(
            writer,
            "{}",
            painter.notice(&std::format!("{} skipped:", count(result.skipped.len(), "test")))
        )?;
        write_list(writer, result.skipped.iter().map(|t| t.display_name(multiple_roots)))?;

        let platform = expectations.platform();
        match expectations.surprising(result.skipped.iter().map(|t| t.name())) {
            Some(surprise) if !surprise.is_empty() => {
                writeln!(
                    writer,
                    "{}",
                    painter.failure(&std::format!(
                        "{} unexpected on {platform}:",
                        count(surprise.len(), "skip")
                    ))
                )?;
                write_list(writer, &surprise)?;
            }
            Some(_) => writeln!(writer, "Those skips are all expected on {platform}.")?,
            None => {
                writeln!(writer, "Ask someone to teach regrtest about which tests are")?;
                writeln!(writer, "expected to get skipped on {platform}.")?;
            }
        }
    }

    Ok(())
}
