use crate::history::HistoryLog;
use crate::runner::{CommandRunner, RunOutcome};
use crate::storage::{CommandRecord, ExecutionResult};
use tracing::{info, warn};

/// Runs a list of generated commands in order, stopping at the first
/// failure.
///
/// Commands in one list are assumed to depend on each other (create a
/// directory, then move a file into it), so nothing runs after a rejection,
/// a non-zero exit, or a failure to record history.
pub struct SequentialExecutor {
    runner: CommandRunner,
    history: Box<dyn HistoryLog>,
    results: Vec<ExecutionResult>,
}

impl SequentialExecutor {
    pub fn new(runner: CommandRunner, history: Box<dyn HistoryLog>) -> Self {
        Self {
            runner,
            history,
            results: Vec::new(),
        }
    }

    pub fn execute_sequential<S: AsRef<str>>(&mut self, commands: &[S]) -> &[ExecutionResult] {
        self.results.clear();

        for (index, command) in commands.iter().enumerate() {
            let command = command.as_ref();
            info!(step = index + 1, total = commands.len(), command, "executing");

            let result = match self.runner.run(command, self.history.as_mut()) {
                Ok(RunOutcome::Rejected { reason }) => {
                    ExecutionResult::new(command, false, format!("Invalid command: {}", reason))
                }
                Ok(outcome) => {
                    ExecutionResult::new(command, outcome.success(), outcome.output().to_string())
                }
                Err(e) => ExecutionResult::new(
                    command,
                    false,
                    format!("Failed to record command history: {}", e),
                ),
            };

            let stop = !result.success;
            self.results.push(result);
            if stop {
                let skipped = commands.len() - index - 1;
                warn!(command, skipped, "stopping sequence after failure");
                break;
            }
        }

        &self.results
    }

    pub fn execute_single(&mut self, command: &str) -> &[ExecutionResult] {
        self.execute_sequential(&[command])
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.results.last()
    }

    pub fn all_results(&self) -> &[ExecutionResult] {
        &self.results
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    pub fn history(&self) -> &[CommandRecord] {
        self.history.all()
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }
}
