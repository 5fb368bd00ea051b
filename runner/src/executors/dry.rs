use super::{CommandRunner, ExecutorError, Invocation, RunOutcome};
use tracing::info;

/// Logs and records invocations without running anything
#[derive(Debug, Default, Clone)]
pub struct DryRunner {
    invocations: Vec<Invocation>,
    outcome: RunOutcome,
}

impl DryRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// report `code` for every recorded command
    #[cfg(test)]
    pub fn with_exit_code(code: i32) -> Self {
        Self {
            invocations: Vec::new(),
            outcome: RunOutcome { code: Some(code) },
        }
    }

    #[cfg(test)]
    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }
}

impl CommandRunner for DryRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError> {
        info!(cwd = ?invocation.cwd, "Dry run: {invocation}");
        self.invocations.push(invocation.clone());

        Ok(self.outcome)
    }
}
