//! Best-effort detection of resources tests leave behind.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

/// Reports things leaked since the last call.
pub trait LeakDetector {
    /// Returns descriptions of newly leaked items; each item is reported once.
    fn detect_leaked(&mut self) -> Vec<String>;
}

/// Detects files and directories left behind in a scratch directory.
#[derive(Debug)]
pub struct LeftoverFileDetector {
    dir: PathBuf,
    known: BTreeSet<PathBuf>,
}

impl LeftoverFileDetector {
    /// Starts watching `dir`; anything already there is not a leak.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let known = entries_under(&dir);

        tracing::debug!(
            target: crate::trace_categories::LEAKS,
            "watching {} ({} existing entries)",
            dir.display(),
            known.len()
        );

        Self { dir, known }
    }
}

impl LeakDetector for LeftoverFileDetector {
    fn detect_leaked(&mut self) -> Vec<String> {
        let leaked: Vec<PathBuf> = entries_under(&self.dir)
            .into_iter()
            .filter(|path| !self.known.contains(path))
            .collect();

        for path in &leaked {
            tracing::debug!(target: crate::trace_categories::LEAKS, "leaked: {}", path.display());
        }

        self.known.extend(leaked.iter().cloned());
        leaked.iter().map(|p| p.display().to_string()).collect()
    }
}

fn entries_under(dir: &Path) -> BTreeSet<PathBuf> {
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(walkdir::DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preexisting_entries_are_not_leaks() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        dir.child("already-here").touch()?;

        let mut detector = LeftoverFileDetector::new(dir.path());
        assert_eq!(detector.detect_leaked(), Vec::<String>::new());
        Ok(())
    }

    #[test]
    fn new_entries_are_reported_once() -> Result<()> {
        let dir = assert_fs::TempDir::new()?;
        let mut detector = LeftoverFileDetector::new(dir.path());

        dir.child("tmp1").touch()?;
        let leaked = detector.detect_leaked();
        assert_eq!(leaked, vec![dir.child("tmp1").path().display().to_string()]);

        assert!(detector.detect_leaked().is_empty());
        Ok(())
    }

    #[test]
    fn missing_dir_reports_nothing() {
        let mut detector = LeftoverFileDetector::new("/nonexistent/regrtest/scratch");
        assert!(detector.detect_leaked().is_empty());
    }
}
