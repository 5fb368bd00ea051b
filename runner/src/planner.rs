use crate::{
    batch::ChunkPlan,
    cleanup::Cleaner,
    collector::{self, list_directory, CollectorError, WorkItem},
    config::{CleanupScope, PlannerConfig},
    executors::{
        slurm::{artifact_index, collect_artifacts, submit_all, Submission},
        CommandRunner, ExecutorError, Invocation,
    },
    script::{artifact_name, ScriptBuilder},
};
use itertools::Itertools;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error("Failed to write artifact {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error("Cleanup globs were invalid: {0}")]
    InvalidGlobs(#[from] globset::Error),
    #[error("Unable to determine the invocation directory: {0}")]
    InvocationDir(#[source] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub items: usize,
    pub artifacts: Vec<PathBuf>,
    pub removed: usize,
    /// artifacts of an earlier run beyond the ones just written, still in the directory
    pub leftovers: usize,
}

#[derive(Debug, Default)]
pub struct SubmissionReport {
    pub submissions: Vec<Submission>,
}

impl SubmissionReport {
    /// accepted by the scheduler
    pub fn accepted(&self) -> usize {
        self.submissions
            .iter()
            .filter(|submission| matches!(&submission.outcome, Ok(status) if status.success()))
            .count()
    }

    /// the submit command ran but exited non-zero
    pub fn rejected(&self) -> usize {
        self.submissions
            .iter()
            .filter(|submission| matches!(&submission.outcome, Ok(status) if !status.success()))
            .count()
    }

    /// the submit command could not be started
    pub fn unspawned(&self) -> usize {
        self.submissions
            .iter()
            .filter(|submission| submission.outcome.is_err())
            .count()
    }
}

/// Turns a directory of input decks into Slurm batch scripts and hands them to the scheduler
#[derive(Debug)]
pub struct Planner<R> {
    config: PlannerConfig,
    runner: R,
}

impl<R: CommandRunner> Planner<R> {
    pub fn new(config: PlannerConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub(crate) fn runner_mut(&mut self) -> &mut R {
        &mut self.runner
    }

    pub fn discover(&self, dir: &Path) -> Result<Vec<WorkItem>, PlannerError> {
        let listing = list_directory(dir)?;
        let items = collector::discover(&listing, &self.config.discovery);

        info!(dir = ?dir, count = items.len(), "Discovered work items");

        Ok(items)
    }

    /// Remove leftovers of an earlier run. Input decks are never removed, even if a cleanup
    /// pattern matches them. Returns the number of files handed to `rm`.
    #[instrument(level = "debug", skip(self))]
    pub fn cleanup(&mut self, dir: &Path) -> Result<usize, PlannerError> {
        let scope_dir = self.cleanup_dir(dir)?;

        let cleaner = Cleaner::new(&self.config.cleanup, &self.config.artifact.prefix)?;
        let listing = list_directory(&scope_dir)?;
        let stale = cleaner
            .stale(&listing)
            .into_iter()
            .filter(|name| !collector::is_input(name, &self.config.discovery))
            .collect_vec();

        if stale.is_empty() {
            debug!(dir = ?scope_dir, "Nothing to clean up");

            return Ok(0);
        }

        let invocation = Invocation::new("rm")
            .arg("-f")
            .arg("--")
            .args(stale.iter().copied())
            .current_dir(&scope_dir);

        let status = self.runner.run(&invocation)?;

        if !status.success() {
            warn!(dir = ?scope_dir, code = ?status.code, "Cleanup did not finish cleanly");
        }

        info!(dir = ?scope_dir, count = stale.len(), "Removed stale files");

        Ok(stale.len())
    }

    /// directory `cleanup` works on when asked to clean `dir`
    fn cleanup_dir(&self, dir: &Path) -> Result<PathBuf, PlannerError> {
        match self.config.cleanup.scope {
            CleanupScope::Target => Ok(dir.to_path_buf()),
            CleanupScope::Invocation => env::current_dir().map_err(PlannerError::InvocationDir),
        }
    }

    /// Write one artifact per chunk of `items` into `dir`, overwriting existing ones
    pub fn generate(&self, dir: &Path, items: &[WorkItem]) -> Result<Vec<PathBuf>, PlannerError> {
        let builder = ScriptBuilder::new(&self.config, dir);
        let plan = ChunkPlan::new(items, self.config.artifact.chunk_size);

        if plan.is_empty() {
            debug!(dir = ?dir, "No work items, no artifacts to write");
        } else {
            debug!(dir = ?dir, chunks = plan.len(), "Writing artifacts");
        }

        plan.iter()
            .map(|chunk| -> Result<PathBuf, PlannerError> {
                let path = dir.join(artifact_name(&self.config.artifact.prefix, chunk.index));

                fs::write(&path, builder.build(&chunk)).map_err(|source| PlannerError::Write {
                    path: path.clone(),
                    source,
                })?;

                debug!(path = ?path, items = chunk.items.len(), "Wrote artifact");

                Ok(path)
            })
            .collect()
    }

    /// cleanup (if `clean` and enabled), discover and generate
    ///
    /// Old artifacts survive when cleanup is skipped or works on another directory, those are
    /// counted and warned about since `pattern` submission would pick them up.
    pub fn plan(&mut self, dir: &Path, clean: bool) -> Result<PlanSummary, PlannerError> {
        let clean = clean && self.config.cleanup.enabled;
        let cleans_dir = clean && self.cleanup_dir(dir)? == dir;
        let removed = if clean { self.cleanup(dir)? } else { 0 };

        let items = self.discover(dir)?;
        let artifacts = self.generate(dir, &items)?;

        let leftovers = if cleans_dir {
            0
        } else {
            self.warn_leftovers(dir, artifacts.len())?
        };

        info!(
            dir = ?dir,
            items = items.len(),
            artifacts = artifacts.len(),
            "Generated batch scripts"
        );

        Ok(PlanSummary {
            items: items.len(),
            artifacts,
            removed,
            leftovers,
        })
    }

    fn warn_leftovers(&self, dir: &Path, generated: usize) -> Result<usize, PlannerError> {
        let leftovers = list_directory(dir)?
            .iter()
            .filter_map(|name| artifact_index(&self.config.artifact.prefix, name))
            .filter(|index| *index >= generated)
            .count();

        if leftovers > 0 {
            warn!(
                dir = ?dir,
                count = leftovers,
                "Artifacts of an earlier run are still present and would be submitted as well"
            );
        }

        Ok(leftovers)
    }

    /// Hand every artifact in `dir` to the scheduler. Rejections are logged, not retried.
    pub fn submit(&mut self, dir: &Path) -> Result<SubmissionReport, PlannerError> {
        let artifacts = collect_artifacts(
            dir,
            &self.config.artifact.prefix,
            &self.config.submit.strategy,
        )?;

        if artifacts.is_empty() {
            info!(dir = ?dir, "No artifacts to submit");
        }

        let submissions = submit_all(
            &mut self.runner,
            &self.config.slurm.submit_command,
            dir,
            artifacts,
        );

        let report = SubmissionReport { submissions };

        info!(
            dir = ?dir,
            accepted = report.accepted(),
            rejected = report.rejected(),
            unspawned = report.unspawned(),
            "Finished submission"
        );

        Ok(report)
    }
}
