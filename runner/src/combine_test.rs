use crate::{
    collector::CollectorError,
    combine::{combine, concatenate, result_files, CombineError},
    config::{Sequence, SweepConfig},
    test_util::workdir,
};
use std::fs;

fn sequence() -> Sequence {
    Sequence {
        start: 25,
        end: 75,
        step: 25,
    }
}

#[test]
pub fn concatenates_directory_by_directory() {
    let root = workdir(&["50/2.txt", "25/2.txt", "50/1.txt", "25/1.txt", "25/1.o", "75/1.txt"]);
    let mut combined = Vec::new();

    let count = concatenate(root.path(), &sequence(), ".txt", &mut combined).unwrap();

    assert_eq!(count, 4);
    assert_eq!(
        String::from_utf8(combined).unwrap(),
        "25/1.txt\n25/2.txt\n50/1.txt\n50/2.txt\n"
    );
}

#[test]
pub fn result_files_are_sorted_by_name() {
    let root = workdir(&["25/b.txt", "25/a.txt", "25/a.o"]);

    let files = result_files(&root.path().join("25"), ".txt").unwrap();

    assert_eq!(
        files,
        vec![root.path().join("25/a.txt"), root.path().join("25/b.txt")]
    );
}

#[test]
pub fn combine_writes_the_output_file() {
    let root = workdir(&["25/1.txt", "50/1.txt"]);
    let config = SweepConfig {
        sequence: sequence(),
        ..SweepConfig::default()
    };
    let output = root.path().join("output.txt");

    assert_eq!(combine(root.path(), &config, &output).unwrap(), 2);
    assert_eq!(fs::read_to_string(&output).unwrap(), "25/1.txt\n50/1.txt\n");
}

#[test]
pub fn missing_sweep_directory_is_an_error() {
    let root = workdir(&["25/1.txt"]);
    let mut combined = Vec::new();

    assert!(matches!(
        concatenate(root.path(), &sequence(), ".txt", &mut combined),
        Err(CombineError::Collector(CollectorError::Unreadable { .. }))
    ));
}

#[test]
pub fn missing_sweep_directory_keeps_the_previous_output() {
    let root = workdir(&["25/1.txt", "output.txt"]);
    let config = SweepConfig {
        sequence: sequence(),
        ..SweepConfig::default()
    };
    let output = root.path().join("output.txt");

    assert!(matches!(
        combine(root.path(), &config, &output),
        Err(CombineError::Collector(CollectorError::Unreadable { .. }))
    ));
    assert_eq!(fs::read_to_string(&output).unwrap(), "output.txt\n");
}
