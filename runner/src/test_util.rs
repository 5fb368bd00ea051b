use std::{fs, path::Path};
use tempfile::TempDir;

/// write every file in `names` below `dir`, creating parent directories as needed
pub fn touch(dir: &Path, names: &[&str]) {
    for name in names {
        let path = dir.join(name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }

        fs::write(&path, format!("{name}\n")).expect("Failed to write test file");
    }
}

/// fresh temporary directory holding `names`
pub fn workdir(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temporary directory");
    touch(dir.path(), names);

    dir
}
