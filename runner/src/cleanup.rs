use crate::config::CleanupConfig;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use itertools::Itertools;
use std::iter;
use tracing::debug;

/// Matches leftovers of an earlier run: scheduler logs, simulation output and restart tapes,
/// and the previous artifacts
#[derive(Debug, Clone)]
pub struct Cleaner {
    set: GlobSet,
}

impl Cleaner {
    /// compile the configured patterns plus `<prefix>*` for earlier artifacts
    pub fn new(config: &CleanupConfig, prefix: &str) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();

        let patterns = config
            .patterns
            .iter()
            .cloned()
            .chain(iter::once(format!("{prefix}*")))
            .unique()
            .collect_vec();

        for pattern in patterns.iter() {
            builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
        }

        debug!(patterns = ?patterns, "Compiled cleanup globs");

        Ok(Self {
            set: builder.build()?,
        })
    }

    pub fn is_stale(&self, name: &str) -> bool {
        self.set.is_match(name)
    }

    /// names from `listing` that should be removed
    pub fn stale<'a>(&self, listing: &'a [String]) -> Vec<&'a str> {
        listing
            .iter()
            .map(String::as_str)
            .filter(|name| self.is_stale(name))
            .collect()
    }
}
