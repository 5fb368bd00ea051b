use super::{CommandRunner, ExecutorError, Invocation, RunOutcome};
use std::process::Command;
use tracing::{debug, instrument};

/// Runs invocations as child processes of this one.
///
/// stdout and stderr are inherited, so whatever the external tool reports lands on the console.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    #[instrument(level = "debug", skip_all, fields(command = %invocation))]
    fn run(&mut self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);

        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let status = command.status().map_err(|source| ExecutorError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        debug!("Finished with {status}");

        Ok(RunOutcome {
            code: status.code(),
        })
    }
}
