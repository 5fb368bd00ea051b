pub mod dry;
pub mod local;
pub mod slurm;

pub use dry::DryRunner;
pub use local::ProcessRunner;

use itertools::Itertools;
use std::{fmt, io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// An external command, described but not yet run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            std::iter::once(&self.program).chain(self.args.iter()).join(" ")
        )
    }
}

/// Exit status of a finished command, `None` if it was killed by a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub code: Option<i32>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl Default for RunOutcome {
    fn default() -> Self {
        Self { code: Some(0) }
    }
}

/// Capability to run external commands (`rm`, `cp`, `sbatch`).
///
/// A non-zero exit is not an error here, callers decide how loud to be about it. Only failing
/// to start the command at all is reported as `ExecutorError`.
pub trait CommandRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError>;
}
