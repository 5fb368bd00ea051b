use crate::config::{DiscoveryConfig, SortOrder};
use ignore::WalkBuilder;
use itertools::Itertools;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Unable to read directory {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),
    #[error("Failed to list directory: {0}")]
    Walk(#[from] ignore::Error),
}

/// One simulation input deck, identified by its file name without the input marker
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkItem {
    stem: String,
    file_name: String,
}

impl WorkItem {
    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// List the names of all non-directory entries of `dir`, sorted.
///
/// Hidden files and ignore files are not special here, every entry is reported.
pub fn list_directory(dir: &Path) -> Result<Vec<String>, CollectorError> {
    let metadata = fs::metadata(dir).map_err(|source| CollectorError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        return Err(CollectorError::NotADirectory(dir.to_path_buf()));
    }

    let mut names = Vec::new();

    for entry in WalkBuilder::new(dir)
        .standard_filters(false)
        .max_depth(Some(1))
        .build()
    {
        let entry = entry?;

        if entry.depth() == 0 || entry.file_type().map_or(false, |kind| kind.is_dir()) {
            continue;
        }

        match entry.file_name().to_str() {
            Some(name) => names.push(name.to_owned()),
            None => warn!(path = ?entry.path(), "Skipping entry with a non UTF-8 name"),
        }
    }

    names.sort_unstable();

    Ok(names)
}

/// whether `name` is an enabled input deck
pub fn is_input(name: &str, config: &DiscoveryConfig) -> bool {
    let marker = config.input_marker.as_str();
    let disabled = config.disabled_marker.as_str();

    !marker.is_empty() && name.contains(marker) && (disabled.is_empty() || !name.contains(disabled))
}

fn work_item(name: &str, config: &DiscoveryConfig) -> Option<WorkItem> {
    if !is_input(name, config) {
        return None;
    }

    let stem = name
        .strip_suffix(config.input_marker.as_str())
        .unwrap_or(name);

    if stem.is_empty() {
        warn!(name = name, "Ignoring input deck without a name");

        return None;
    }

    Some(WorkItem {
        stem: stem.to_owned(),
        file_name: name.to_owned(),
    })
}

/// Filter a directory listing down to the enabled input decks, ordered by stem.
///
/// This never touches the filesystem, feed it the output of `list_directory`.
pub fn discover<I, S>(listing: I, config: &DiscoveryConfig) -> Vec<WorkItem>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items = listing
        .into_iter()
        .filter_map(|name| work_item(name.as_ref(), config))
        .sorted();

    let items = match config.order {
        SortOrder::Ascending => items.collect_vec(),
        SortOrder::Descending => items.rev().collect_vec(),
    };

    debug!(count = items.len(), "Filtered listing into work items");

    items
}
