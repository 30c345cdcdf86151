//! Locating test directories and the test units inside them.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{error::FilesystemError, filesystem::Filesystem};

/// Prefix every discoverable test unit name starts with.
pub const TEST_NAME_PREFIX: &str = "test_";

/// Returns the search roots that exist as directories.
///
/// In narrow mode only the first qualifying root is returned.
pub fn find_test_dirs(fs: &dyn Filesystem, search_path: &[PathBuf], broad: bool) -> Vec<PathBuf> {
    let mut dirs = vec![];
    for candidate in search_path {
        if !fs.is_dir(candidate) {
            tracing::debug!(
                target: crate::trace_categories::DISCOVERY,
                "skipping {}: not a directory",
                candidate.display()
            );
            continue;
        }

        if !dirs.contains(candidate) {
            dirs.push(candidate.clone());
        }

        if !broad {
            break;
        }
    }

    dirs
}

/// Lists the non-standard test units found in one root, sorted.
fn discover_in(
    fs: &dyn Filesystem,
    root: &Path,
    extension: &str,
    standard: &[String],
    excluded: &[String],
) -> Result<BTreeSet<String>, FilesystemError> {
    let suffix = std::format!(".{extension}");

    let found: BTreeSet<String> = fs
        .list_entries(root)?
        .into_iter()
        .filter(|entry| entry.starts_with(TEST_NAME_PREFIX))
        .filter_map(|entry| entry.strip_suffix(suffix.as_str()).map(str::to_owned))
        .filter(|name| !standard.contains(name) && !excluded.contains(name))
        .collect();

    tracing::debug!(
        target: crate::trace_categories::DISCOVERY,
        "found {} test(s) in {}",
        found.len(),
        root.display()
    );

    Ok(found)
}

/// Returns every test in one root: the standard list, then the sorted discoveries.
pub fn find_tests(
    fs: &dyn Filesystem,
    root: &Path,
    extension: &str,
    standard: &[String],
    excluded: &[String],
) -> Result<Vec<String>, FilesystemError> {
    let found = discover_in(fs, root, extension, standard, excluded)?;
    Ok(standard.iter().cloned().chain(found).collect())
}

/// Returns every test across the given roots, deduplicated.
///
/// The standard list comes first in its own order; names discovered in any
/// root follow, sorted.
pub fn find_all_tests(
    fs: &dyn Filesystem,
    roots: &[PathBuf],
    extension: &str,
    standard: &[String],
    excluded: &[String],
) -> Result<Vec<String>, FilesystemError> {
    let mut found = BTreeSet::new();
    for root in roots {
        found.extend(discover_in(fs, root, extension, standard, excluded)?);
    }

    Ok(standard.iter().cloned().chain(found).collect())
}

/// Strips a literal `.<extension>` suffix so file and bare names are interchangeable.
pub fn strip_source_extension(name: &str, extension: &str) -> String {
    name.strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(name)
        .to_owned()
}

/// Turns named tests into exclusions.
///
/// The names are dropped from the standard list, put at the front of the
/// excluded list, and cleared from `named` so discovery runs instead.
pub fn apply_exclusions(named: &mut Vec<String>, standard: &mut Vec<String>, excluded: &mut Vec<String>) {
    standard.retain(|name| !named.contains(name));

    let mut combined = std::mem::take(named);
    combined.append(excluded);
    *excluded = combined;
}

/// Shuffles the tests, returning the seed used.
pub fn shuffle_tests(tests: &mut [String], seed: Option<u64>) -> u64 {
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    tests.shuffle(&mut rng);
    seed
}
