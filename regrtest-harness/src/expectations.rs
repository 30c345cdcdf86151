//! Per-platform lists of tests that are expected to be skipped.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

/// Expected skips, keyed by the platform names Rust reports for `target_os`.
const EXPECTED_SKIPS: &[(&str, &[&str])] = &[
    (
        "freebsd",
        &[
            "test_al",
            "test_cd",
            "test_cl",
            "test_curses",
            "test_email_codecs",
            "test_gdbm",
            "test_gl",
            "test_imgfile",
            "test_linuxaudiodev",
            "test_locale",
            "test_minidom",
            "test_nis",
            "test_pyexpat",
            "test_sax",
            "test_socket_ssl",
            "test_socketserver",
            "test_sunaudiodev",
            "test_unicode_file",
            "test_winreg",
            "test_winsound",
        ],
    ),
    (
        "linux",
        &[
            "test_al",
            "test_cd",
            "test_cl",
            "test_curses",
            "test_dl",
            "test_email_codecs",
            "test_gl",
            "test_imgfile",
            "test_largefile",
            "test_nis",
            "test_ntpath",
            "test_socket_ssl",
            "test_socketserver",
            "test_sunaudiodev",
            "test_unicode_file",
            "test_winreg",
            "test_winsound",
        ],
    ),
    (
        "macos",
        &[
            "test_al",
            "test_cd",
            "test_cl",
            "test_curses",
            "test_dl",
            "test_email_codecs",
            "test_gdbm",
            "test_gl",
            "test_imgfile",
            "test_largefile",
            "test_locale",
            "test_linuxaudiodev",
            "test_minidom",
            "test_nis",
            "test_ntpath",
            "test_poll",
            "test_socket_ssl",
            "test_socketserver",
            "test_sunaudiodev",
            "test_unicode_file",
            "test_winreg",
            "test_winsound",
        ],
    ),
    (
        "solaris",
        &[
            "test_al",
            "test_bsddb",
            "test_cd",
            "test_cl",
            "test_curses",
            "test_dbm",
            "test_email_codecs",
            "test_gdbm",
            "test_gl",
            "test_gzip",
            "test_imgfile",
            "test_linuxaudiodev",
            "test_mpz",
            "test_openpty",
            "test_socketserver",
            "test_zipfile",
            "test_zlib",
        ],
    ),
    (
        "windows",
        &[
            "test_al",
            "test_cd",
            "test_cl",
            "test_commands",
            "test_crypt",
            "test_curses",
            "test_dbm",
            "test_dl",
            "test_email_codecs",
            "test_fcntl",
            "test_fork1",
            "test_gdbm",
            "test_gl",
            "test_grp",
            "test_imgfile",
            "test_largefile",
            "test_linuxaudiodev",
            "test_mhlib",
            "test_nis",
            "test_openpty",
            "test_poll",
            "test_pty",
            "test_pwd",
            "test_signal",
            "test_socket_ssl",
            "test_socketserver",
            "test_sunaudiodev",
            "test_timing",
        ],
    ),
];

static EXPECTATIONS: LazyLock<BTreeMap<&'static str, BTreeSet<&'static str>>> =
    LazyLock::new(|| {
        EXPECTED_SKIPS
            .iter()
            .map(|(platform, names)| (*platform, names.iter().copied().collect()))
            .collect()
    });

/// Returns the identifier of the platform this process runs on.
pub const fn current_platform() -> &'static str {
    std::env::consts::OS
}

/// The set of tests expected to be skipped on one platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedSkips {
    platform: String,
    expected: Option<BTreeSet<String>>,
}

impl ExpectedSkips {
    /// Looks up the built-in table for the given platform.
    pub fn for_platform(platform: &str) -> Self {
        let expected = EXPECTATIONS
            .get(platform)
            .map(|names| names.iter().map(|n| (*n).to_owned()).collect());

        Self {
            platform: platform.to_owned(),
            expected,
        }
    }

    /// Builds an expectation set from explicit names.
    pub fn from_names<I, S>(platform: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            platform: platform.to_owned(),
            expected: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns whether the table knows about this platform.
    pub const fn is_valid(&self) -> bool {
        self.expected.is_some()
    }

    /// The platform these expectations apply to.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Returns the skipped names that were not expected, or `None` for an unknown platform.
    pub fn surprising<'a, I>(&self, skipped: I) -> Option<BTreeSet<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let expected = self.expected.as_ref()?;
        Some(
            skipped
                .into_iter()
                .filter(|name| !expected.contains(*name))
                .map(str::to_owned)
                .collect(),
        )
    }
}
