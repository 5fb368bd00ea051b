use crate::{
    collector::{list_directory, CollectorError},
    config::{Sequence, SweepConfig},
};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CombineError {
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error("Failed to open result file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to append {path:?} to the combined output: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write combined output {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// result files of a single directory, sorted by name
pub fn result_files(dir: &Path, marker: &str) -> Result<Vec<PathBuf>, CollectorError> {
    Ok(list_directory(dir)?
        .into_iter()
        .filter(|name| name.contains(marker))
        .map(|name| dir.join(name))
        .collect())
}

/// result files of every sweep directory, in sequence order
pub fn sweep_results(
    root: &Path,
    sequence: &Sequence,
    marker: &str,
) -> Result<Vec<PathBuf>, CollectorError> {
    let mut files = Vec::new();

    for name in sequence.directories() {
        files.extend(result_files(&root.join(name), marker)?);
    }

    Ok(files)
}

fn append_all<W: Write>(files: &[PathBuf], writer: &mut W) -> Result<usize, CombineError> {
    for path in files {
        let mut file = File::open(path).map_err(|source| CombineError::Read {
            path: path.clone(),
            source,
        })?;

        io::copy(&mut file, writer).map_err(|source| CombineError::Append {
            path: path.clone(),
            source,
        })?;

        debug!(path = ?path, "Appended result file");
    }

    Ok(files.len())
}

/// Append the contents of every result file, directory by directory, to `writer`.
/// Returns the number of files appended.
pub fn concatenate<W: Write>(
    root: &Path,
    sequence: &Sequence,
    marker: &str,
    writer: &mut W,
) -> Result<usize, CombineError> {
    let files = sweep_results(root, sequence, marker)?;

    append_all(&files, writer)
}

/// Concatenate the sweep results below `root` into `output`.
///
/// Every sweep directory is listed before `output` is touched, so a missing one leaves an
/// earlier combined file as it was.
pub fn combine(root: &Path, config: &SweepConfig, output: &Path) -> Result<usize, CombineError> {
    let write_error = |source: io::Error| CombineError::Write {
        path: output.to_path_buf(),
        source,
    };

    let files = sweep_results(root, &config.sequence, &config.result_marker)?;

    let mut writer = BufWriter::new(File::create(output).map_err(write_error)?);
    let count = append_all(&files, &mut writer)?;
    writer.flush().map_err(write_error)?;

    info!(output = ?output, files = count, "Combined result files");

    Ok(count)
}
