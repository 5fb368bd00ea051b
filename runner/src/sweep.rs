use crate::{
    executors::{CommandRunner, Invocation},
    planner::{PlanSummary, Planner, PlannerError, SubmissionReport},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct SweepReport {
    pub planned: Vec<(PathBuf, PlanSummary)>,
    pub skipped: Vec<PathBuf>,
    pub submissions: Vec<SubmissionReport>,
}

/// Plan every subdirectory of the sweep sequence below `root`.
///
/// The support files (post-processing scripts) are copied into each directory first, since the
/// generated artifacts call them relative to that directory. Missing directories are skipped.
pub fn sweep<R: CommandRunner>(
    planner: &mut Planner<R>,
    root: &Path,
    submit: bool,
) -> Result<SweepReport, PlannerError> {
    let config = planner.config().sweep.clone();
    let mut report = SweepReport::default();

    for name in config.sequence.directories() {
        let dir = root.join(&name);

        if !dir.is_dir() {
            warn!(dir = ?dir, "Skipping missing sweep directory");
            report.skipped.push(dir);

            continue;
        }

        for file in config.support_files.iter() {
            let Some(file_name) = file.file_name() else {
                warn!(file = ?file, "Support file has no file name, not copying it");

                continue;
            };

            let invocation = Invocation::new("cp")
                .arg(file.to_string_lossy())
                .arg(dir.join(file_name).to_string_lossy())
                .current_dir(root);

            let status = planner.runner_mut().run(&invocation)?;

            if !status.success() {
                warn!(file = ?file, dir = ?dir, code = ?status.code, "Failed to copy support file");
            }
        }

        let summary = planner.plan(&dir, true)?;

        if submit {
            report.submissions.push(planner.submit(&dir)?);
        }

        report.planned.push((dir, summary));
    }

    info!(
        planned = report.planned.len(),
        skipped = report.skipped.len(),
        "Finished sweep"
    );

    Ok(report)
}
