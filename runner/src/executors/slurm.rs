/*
 * Submission handoff to Slurm:
 * 1. Find the artifacts, either every `<prefix><index>` file or a fixed index range
 * 2. Hand each one to `sbatch` (or whatever `slurm.submit_command` is), in index order
 * 3. Exit codes are logged per artifact, nothing is retried or aborted
 */

use super::{CommandRunner, ExecutorError, Invocation, RunOutcome};
use crate::{
    collector::{list_directory, CollectorError},
    config::SubmitStrategy,
    script::artifact_name,
};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// A generated batch script on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct Submission {
    pub artifact: Artifact,
    pub outcome: Result<RunOutcome, ExecutorError>,
}

/// Chunk index encoded in an artifact file name, `None` for anything else
pub fn artifact_index(prefix: &str, name: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;

    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    // `pbatch01` is never generated, only `pbatch1` maps to index 1
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }

    digits.parse().ok()
}

/// Find the artifacts to submit in `dir`, ordered by index
pub fn collect_artifacts(
    dir: &Path,
    prefix: &str,
    strategy: &SubmitStrategy,
) -> Result<Vec<Artifact>, CollectorError> {
    let listing = list_directory(dir)?;
    let artifact = |index: usize, name: String| Artifact {
        index,
        path: dir.join(&name),
        name,
    };

    let artifacts = match strategy {
        SubmitStrategy::Pattern => listing
            .into_iter()
            .filter_map(|name| artifact_index(prefix, &name).map(|index| artifact(index, name)))
            .sorted_by_key(|artifact| artifact.index)
            .collect_vec(),
        SubmitStrategy::Range { start, end } => {
            let (present, missing): (Vec<_>, Vec<_>) = (*start..=*end)
                .map(|index| (index, artifact_name(prefix, index)))
                .partition(|(_, name)| listing.binary_search(name).is_ok());

            if !missing.is_empty() {
                warn!(
                    count = missing.len(),
                    first = %missing[0].1,
                    "Skipping artifacts in the submit range that do not exist"
                );
            }

            present
                .into_iter()
                .map(|(index, name)| artifact(index, name))
                .collect_vec()
        }
    };

    Ok(artifacts)
}

/// Hand every artifact to the scheduler, each submission independent of the others
pub fn submit_all<R: CommandRunner>(
    runner: &mut R,
    command: &str,
    dir: &Path,
    artifacts: Vec<Artifact>,
) -> Vec<Submission> {
    artifacts
        .into_iter()
        .map(|artifact| {
            let invocation = Invocation::new(command)
                .arg(artifact.name.as_str())
                .current_dir(dir);
            let outcome = runner.run(&invocation);

            match &outcome {
                Ok(status) if status.success() => {
                    info!(artifact = ?artifact.path, "Submitted")
                }
                Ok(status) => warn!(
                    artifact = ?artifact.path,
                    code = ?status.code,
                    "{command} rejected the artifact"
                ),
                Err(e) => error!(artifact = ?artifact.path, "Submission failed: {e}"),
            }

            Submission { artifact, outcome }
        })
        .collect()
}
