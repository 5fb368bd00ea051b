use crate::{
    config::{CleanupScope, PlannerConfig, Sequence, SubmitStrategy},
    executors::{DryRunner, Invocation},
    planner::Planner,
    sweep::sweep,
    test_util::workdir,
};
use std::{fs, num::NonZeroUsize, path::Path};

fn config(chunk_size: usize) -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.artifact.chunk_size = NonZeroUsize::new(chunk_size).unwrap();

    config
}

fn runs(script: &str) -> Vec<&str> {
    script
        .lines()
        .filter(|line| line.starts_with("srun"))
        .collect()
}

fn submitted(invocations: &[Invocation]) -> Vec<&str> {
    invocations
        .iter()
        .filter(|invocation| invocation.program == "sbatch")
        .map(|invocation| invocation.args[0].as_str())
        .collect()
}

#[test]
pub fn plan_writes_one_artifact_per_chunk() {
    let dir = workdir(&["a.i", "b.i", "c.i", "#d.i"]);
    let mut planner = Planner::new(config(2), DryRunner::new());

    let summary = planner.plan(dir.path(), true).unwrap();

    assert_eq!(summary.items, 3);
    assert_eq!(summary.removed, 0);
    assert_eq!(
        summary.artifacts,
        vec![dir.path().join("pbatch0"), dir.path().join("pbatch1")]
    );

    let first = fs::read_to_string(dir.path().join("pbatch0")).unwrap();
    let second = fs::read_to_string(dir.path().join("pbatch1")).unwrap();

    assert!(first.contains(&format!("\ncd \"{}\"\n", dir.path().display())));
    assert_eq!(runs(&first).len(), 2);
    assert!(runs(&first)[0].contains("inp=a.i out=a.o"));
    assert!(runs(&first)[1].contains("inp=b.i out=b.o"));
    assert_eq!(runs(&second).len(), 1);
    assert!(runs(&second)[0].contains("inp=c.i out=c.o"));
    assert!(!second.contains("d.i"));

    assert!(planner.runner().invocations().is_empty());
}

#[test]
pub fn generate_then_submit() {
    let dir = workdir(&["a.i", "b.i", "c.i", "#d.i"]);
    let mut planner = Planner::new(config(2), DryRunner::new());

    planner.plan(dir.path(), true).unwrap();
    let report = planner.submit(dir.path()).unwrap();

    assert_eq!(report.accepted(), 2);
    assert_eq!(submitted(planner.runner().invocations()), vec!["pbatch0", "pbatch1"]);
    assert!(planner
        .runner()
        .invocations()
        .iter()
        .all(|invocation| invocation.cwd.as_deref() == Some(dir.path())));
}

#[test]
pub fn empty_directory_plans_and_submits_nothing() {
    let dir = workdir(&[]);
    let mut planner = Planner::new(PlannerConfig::default(), DryRunner::new());

    let summary = planner.plan(dir.path(), true).unwrap();
    let report = planner.submit(dir.path()).unwrap();

    assert_eq!(summary.items, 0);
    assert!(summary.artifacts.is_empty());
    assert!(report.submissions.is_empty());
    assert!(planner.runner().invocations().is_empty());
}

#[test]
pub fn missing_directory_fails_discovery() {
    let dir = workdir(&[]);
    let mut planner = Planner::new(PlannerConfig::default(), DryRunner::new());

    assert!(planner.plan(&dir.path().join("missing"), true).is_err());
    assert!(planner.submit(&dir.path().join("missing")).is_err());
}

#[test]
pub fn regenerating_is_byte_identical() {
    let dir = workdir(&["b.i", "a.i", "c.i"]);
    let mut planner = Planner::new(config(2), DryRunner::new());

    planner.plan(dir.path(), true).unwrap();
    let first = fs::read(dir.path().join("pbatch1")).unwrap();

    planner.plan(dir.path(), true).unwrap();
    let second = fs::read(dir.path().join("pbatch1")).unwrap();

    assert_eq!(first, second);
}

#[test]
pub fn cleanup_removes_leftovers_but_never_input_decks() {
    let dir = workdir(&[
        "a.i",
        "a.o",
        "a.runtpe",
        "notes.md",
        "pbatch3",
        "quartz12",
        "slurm-77.out",
        "slurm.i",
    ]);
    let mut planner = Planner::new(PlannerConfig::default(), DryRunner::new());

    let removed = planner.cleanup(dir.path()).unwrap();

    assert_eq!(removed, 5);
    assert_eq!(
        planner.runner().invocations(),
        &[Invocation::new("rm")
            .args(["-f", "--", "a.o", "a.runtpe", "pbatch3", "quartz12", "slurm-77.out"])
            .current_dir(dir.path())]
    );
}

#[test]
pub fn cleanup_follows_a_changed_prefix() {
    let dir = workdir(&["a.i", "job0", "pbatch0"]);
    let mut config = PlannerConfig::default();
    config.artifact.prefix = "job".to_owned();
    config.cleanup.patterns.clear();

    let mut planner = Planner::new(config, DryRunner::new());

    assert_eq!(planner.cleanup(dir.path()).unwrap(), 1);
    assert_eq!(planner.runner().invocations()[0].args, vec!["-f", "--", "job0"]);
}

#[test]
pub fn invocation_scope_ignores_the_target() {
    // unit tests run from the package root, which holds no leftovers
    let dir = workdir(&["a.i", "a.o", "slurm-1.out"]);
    let mut config = PlannerConfig::default();
    config.cleanup.scope = CleanupScope::Invocation;

    let mut planner = Planner::new(config, DryRunner::new());

    assert_eq!(planner.cleanup(dir.path()).unwrap(), 0);
    assert!(planner.runner().invocations().is_empty());
}

#[test]
pub fn invocation_scope_reports_artifacts_left_in_the_target() {
    let dir = workdir(&["a.i", "pbatch0", "pbatch5"]);
    let mut config = PlannerConfig::default();
    config.cleanup.scope = CleanupScope::Invocation;

    let mut planner = Planner::new(config, DryRunner::new());
    let summary = planner.plan(dir.path(), true).unwrap();

    assert_eq!(summary.artifacts, vec![dir.path().join("pbatch0")]);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.leftovers, 1);
}

#[test]
pub fn target_scope_cleans_instead_of_reporting_leftovers() {
    let dir = workdir(&["a.i", "pbatch0", "pbatch5"]);
    let mut planner = Planner::new(PlannerConfig::default(), DryRunner::new());

    let summary = planner.plan(dir.path(), true).unwrap();

    assert_eq!(summary.removed, 2);
    assert_eq!(summary.leftovers, 0);
}

#[test]
pub fn disabled_cleanup_is_skipped_by_plan() {
    let dir = workdir(&["a.i", "a.o"]);
    let mut config = PlannerConfig::default();
    config.cleanup.enabled = false;

    let mut planner = Planner::new(config, DryRunner::new());
    let summary = planner.plan(dir.path(), true).unwrap();

    assert_eq!(summary.removed, 0);
    assert!(planner.runner().invocations().is_empty());
}

#[test]
pub fn plan_without_cleanup_keeps_old_artifacts() {
    let dir = workdir(&["a.i", "pbatch5"]);
    let mut planner = Planner::new(PlannerConfig::default(), DryRunner::new());

    let summary = planner.plan(dir.path(), false).unwrap();

    assert_eq!(summary.artifacts, vec![dir.path().join("pbatch0")]);
    assert_eq!(summary.leftovers, 1);
    assert!(dir.path().join("pbatch5").is_file());
    assert!(planner.runner().invocations().is_empty());
}

#[test]
pub fn pattern_submission_goes_by_index() {
    let dir = workdir(&[
        "a.i",
        "pbatch",
        "pbatch0",
        "pbatch01",
        "pbatch1",
        "pbatch10",
        "pbatch2",
        "pbatch2.bak",
    ]);
    let mut planner = Planner::new(PlannerConfig::default(), DryRunner::new());

    let report = planner.submit(dir.path()).unwrap();

    assert_eq!(report.accepted(), 4);
    assert_eq!(
        submitted(planner.runner().invocations()),
        vec!["pbatch0", "pbatch1", "pbatch2", "pbatch10"]
    );
}

#[test]
pub fn range_submission_skips_missing_artifacts() {
    let dir = workdir(&["pbatch0", "pbatch2", "pbatch7"]);
    let mut config = PlannerConfig::default();
    config.submit.strategy = SubmitStrategy::Range { start: 0, end: 3 };

    let mut planner = Planner::new(config, DryRunner::new());
    let report = planner.submit(dir.path()).unwrap();

    assert_eq!(report.submissions.len(), 2);
    assert_eq!(submitted(planner.runner().invocations()), vec!["pbatch0", "pbatch2"]);
}

#[test]
pub fn rejected_submissions_do_not_stop_the_rest() {
    let dir = workdir(&["pbatch0", "pbatch1"]);
    let mut planner = Planner::new(PlannerConfig::default(), DryRunner::with_exit_code(1));
    let report = planner.submit(dir.path()).unwrap();

    assert_eq!(report.accepted(), 0);
    assert_eq!(report.rejected(), 2);
    assert_eq!(report.unspawned(), 0);
    assert_eq!(planner.runner().invocations().len(), 2);
}

fn sweep_root() -> (tempfile::TempDir, PlannerConfig) {
    let root = workdir(&["25/x.i", "75/y.i", "75/#z.i", "single.py"]);
    let mut config = PlannerConfig::default();
    config.sweep.sequence = Sequence {
        start: 25,
        end: 100,
        step: 25,
    };

    (root, config)
}

fn copy(root: &Path, dir: &str) -> Invocation {
    Invocation::new("cp")
        .arg("single.py")
        .arg(root.join(dir).join("single.py").to_string_lossy())
        .current_dir(root)
}

#[test]
pub fn sweep_plans_every_existing_directory() {
    let (root, config) = sweep_root();
    let root = root.path();
    let mut planner = Planner::new(config, DryRunner::new());

    let report = sweep(&mut planner, root, false).unwrap();

    let planned = report
        .planned
        .iter()
        .map(|(dir, summary)| (dir.clone(), summary.items))
        .collect::<Vec<_>>();

    assert_eq!(planned, vec![(root.join("25"), 1), (root.join("75"), 1)]);
    assert_eq!(report.skipped, vec![root.join("50")]);
    assert!(report.submissions.is_empty());
    assert_eq!(
        planner.runner().invocations(),
        &[copy(root, "25"), copy(root, "75")]
    );

    let script = fs::read_to_string(root.join("75").join("pbatch0")).unwrap();

    assert!(script.contains(&format!("\ncd {}\n", root.join("75").display())));
    assert!(script.contains("inp=y.i"));
    assert!(!script.contains("z.i"));
}

#[test]
pub fn sweep_submits_each_directory_after_planning_it() {
    let (root, config) = sweep_root();
    let root = root.path();
    let mut planner = Planner::new(config, DryRunner::new());

    let report = sweep(&mut planner, root, true).unwrap();

    assert_eq!(report.submissions.len(), 2);

    let order = planner
        .runner()
        .invocations()
        .iter()
        .map(|invocation| (invocation.program.as_str(), invocation.cwd.clone()))
        .collect::<Vec<_>>();

    assert_eq!(
        order,
        vec![
            ("cp", Some(root.to_path_buf())),
            ("sbatch", Some(root.join("25"))),
            ("cp", Some(root.to_path_buf())),
            ("sbatch", Some(root.join("75"))),
        ]
    );
}
