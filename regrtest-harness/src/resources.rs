//! Special resources that resource-intensive tests must be granted explicitly.

use std::{fmt::Display, str::FromStr};

use crate::error::ConfigurationError;

/// A resource a test may require before it is willing to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// Tests that use curses and will modify the terminal's state and output modes.
    Curses,
    /// Tests that may create huge files and take a long time doing it.
    Largefile,
    /// Tests that use external network resources.
    Network,
}

impl Resource {
    /// Every known resource, in the order `all` enables them.
    pub const ALL: [Self; 3] = [Self::Curses, Self::Largefile, Self::Network];

    /// Returns the name used for this resource on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Curses => "curses",
            Self::Largefile => "largefile",
            Self::Network => "network",
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Resource {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigurationError::InvalidResource(s.to_owned()))
    }
}

/// The set of resources enabled for a run, in order of enablement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceSet(Vec<Resource>);

impl ResourceSet {
    /// Returns a set with every known resource enabled.
    pub fn all() -> Self {
        Self(Resource::ALL.to_vec())
    }

    /// Applies one `-u/--use` option value.
    ///
    /// The value is a comma-separated list. `all` enables every resource, a name
    /// enables that resource, and a name prefixed with `-` revokes it. Words are
    /// processed left to right, so `all,-network` enables everything but the
    /// network.
    pub fn apply_use_option(&mut self, value: &str) -> Result<(), ConfigurationError> {
        for word in value.split(',') {
            let word = word.to_ascii_lowercase();
            if word == "all" {
                *self = Self::all();
                continue;
            }

            let (remove, name) = match word.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, word.as_str()),
            };

            let resource: Resource = name
                .parse()
                .map_err(|_| ConfigurationError::InvalidResource(value.to_owned()))?;

            if remove {
                self.0.retain(|r| *r != resource);
            } else if !self.0.contains(&resource) {
                self.0.push(resource);
            }
        }

        Ok(())
    }

    /// Returns whether the given resource is enabled.
    pub fn contains(&self, resource: Resource) -> bool {
        self.0.contains(&resource)
    }

    /// Iterates the enabled resources in order of enablement.
    pub fn iter(&self) -> impl Iterator<Item = Resource> + '_ {
        self.0.iter().copied()
    }

    /// Renders the set as a comma-separated list of names.
    pub fn to_list_string(&self) -> String {
        self.iter().map(Resource::name).collect::<Vec<_>>().join(",")
    }
}
