//! Saving categorized results to a memo file, and reading them back.

use std::path::Path;

use descape::UnescapeExt;

use crate::{
    error::{Error, MemoError},
    filesystem::Filesystem,
    suite::SuiteResult,
};

const SECTIONS: [&str; 3] = ["good", "bad", "skipped"];

/// The three result lists of a run, as rendered names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memo {
    /// Tests that passed.
    pub good: Vec<String>,
    /// Tests that failed or crashed.
    pub bad: Vec<String>,
    /// Tests that were skipped.
    pub skipped: Vec<String>,
}

impl Memo {
    /// Captures the results of a finished run.
    pub fn from_result(result: &SuiteResult) -> Self {
        let names = |ids: &[crate::unit::TestUnitId]| -> Vec<String> {
            ids.iter()
                .map(|id| id.display_name(result.multiple_roots))
                .collect()
        };

        Self {
            good: names(&result.good),
            bad: names(&result.bad),
            skipped: names(&result.skipped),
        }
    }

    fn section(&self, name: &str) -> &[String] {
        match name {
            "good" => &self.good,
            "bad" => &self.bad,
            _ => &self.skipped,
        }
    }

    fn section_mut(&mut self, name: &str) -> &mut Vec<String> {
        match name {
            "good" => &mut self.good,
            "bad" => &mut self.bad,
            _ => &mut self.skipped,
        }
    }

    /// Renders the memo text; every entry is a quoted, escaped literal.
    pub fn render(&self) -> String {
        let mut lines = vec![];
        for name in SECTIONS {
            lines.push(std::format!("{name} = ["));
            lines.extend(self.section(name).iter().map(|entry| std::format!("    {entry:?},")));
            lines.push(" ]".to_owned());
        }

        lines.push(String::new());
        lines.join("\n")
    }

    /// Parses memo text produced by [`Memo::render`].
    pub fn parse(text: &str) -> Result<Self, MemoError> {
        let mut memo = Self::default();
        let mut seen: Vec<&str> = vec![];
        let mut current: Option<&'static str> = None;

        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;
            let malformed = |message| MemoError::Malformed {
                line: line_number,
                message,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match current {
                None => {
                    let name = trimmed
                        .strip_suffix('[')
                        .and_then(|rest| rest.trim_end().strip_suffix('='))
                        .map(str::trim_end)
                        .ok_or_else(|| malformed("expected `<section> = [`"))?;

                    let section = SECTIONS
                        .into_iter()
                        .find(|s| *s == name)
                        .ok_or_else(|| malformed("unknown section"))?;

                    if seen.contains(&section) {
                        return Err(malformed("duplicate section"));
                    }
                    seen.push(section);
                    current = Some(section);
                }
                Some(_) if trimmed == "]" => current = None,
                Some(section) => {
                    let literal = trimmed.strip_suffix(',').unwrap_or(trimmed);
                    let inner = literal
                        .strip_prefix('"')
                        .and_then(|rest| rest.strip_suffix('"'))
                        .ok_or_else(|| malformed("expected a quoted entry"))?;

                    let entry = inner
                        .to_unescaped()
                        .map_err(|_| malformed("invalid escape in entry"))?;

                    memo.section_mut(section).push(entry.to_string());
                }
            }
        }

        if current.is_some() {
            return Err(MemoError::Malformed {
                line: text.lines().count(),
                message: "unterminated section",
            });
        }

        if let Some(missing) = SECTIONS.into_iter().find(|s| !seen.contains(s)) {
            return Err(MemoError::MissingSection(missing));
        }

        Ok(memo)
    }

    /// Writes the memo to `path`.
    pub fn save(&self, fs: &dyn Filesystem, path: &Path) -> Result<(), Error> {
        fs.write_all(path, self.render().as_bytes())?;

        tracing::debug!(target: crate::trace_categories::SUITE, "saved memo to {}", path.display());
        Ok(())
    }
}
