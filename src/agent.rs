use crate::executor::SequentialExecutor;
use crate::storage::{CommandRecord, ExecutionResult};
use crate::translator::{parse_candidates, TranslationRequest, Translator};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

pub const NO_COMMANDS_ERROR: &str = "No valid commands were generated";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProcessOutcome {
    Executed {
        original_command: String,
        interpreted_commands: Vec<String>,
        results: Vec<ExecutionResult>,
        working_directory: PathBuf,
    },
    Failed {
        original_command: String,
        error: String,
        working_directory: PathBuf,
    },
}

impl ProcessOutcome {
    /// True only when commands ran and every one of them succeeded.
    pub fn success(&self) -> bool {
        match self {
            ProcessOutcome::Executed { results, .. } => {
                !results.is_empty() && results.iter().all(|r| r.success)
            }
            ProcessOutcome::Failed { .. } => false,
        }
    }

    pub fn original_command(&self) -> &str {
        match self {
            ProcessOutcome::Executed { original_command, .. }
            | ProcessOutcome::Failed { original_command, .. } => original_command,
        }
    }
}

/// Renders outcomes. The agent hands every outcome to exactly one reporter
/// call and never prints anything itself.
pub trait Reporter {
    fn report(&self, outcome: &ProcessOutcome);
}

pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _outcome: &ProcessOutcome) {}
}

pub struct CommandAgent<T: Translator> {
    translator: T,
    executor: SequentialExecutor,
    working_directory: PathBuf,
}

impl<T: Translator> CommandAgent<T> {
    pub fn new(translator: T, executor: SequentialExecutor) -> Self {
        let working_directory = executor.runner().working_dir().to_path_buf();
        Self {
            translator,
            executor,
            working_directory,
        }
    }

    pub fn process_command(&mut self, text: &str, reporter: &dyn Reporter) -> ProcessOutcome {
        let outcome = self.translate_and_execute(text);
        reporter.report(&outcome);
        outcome
    }

    fn translate_and_execute(&mut self, text: &str) -> ProcessOutcome {
        let request = TranslationRequest::new(text, self.working_directory.clone());
        let raw = match self.translator.translate(&request) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "translation failed");
                return self.failed(text, e.to_string());
            }
        };

        let commands = parse_candidates(&raw);
        if commands.is_empty() {
            warn!(instruction = text, "translation produced no commands");
            return self.failed(text, NO_COMMANDS_ERROR.to_string());
        }
        info!(count = commands.len(), "translated instruction");

        let results = self.executor.execute_sequential(&commands).to_vec();
        ProcessOutcome::Executed {
            original_command: text.to_string(),
            interpreted_commands: commands,
            results,
            working_directory: self.working_directory.clone(),
        }
    }

    fn failed(&self, text: &str, error: String) -> ProcessOutcome {
        ProcessOutcome::Failed {
            original_command: text.to_string(),
            error,
            working_directory: self.working_directory.clone(),
        }
    }

    pub fn command_history(&self) -> &[CommandRecord] {
        self.executor.history()
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.executor.last_result()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::TranslationError;
    use crate::history::JsonHistoryStore;
    use crate::policy::AllowlistPolicy;
    use crate::runner::CommandRunner;
    use crate::translator::StaticTranslator;
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::tempdir;

    struct FailingTranslator;

    impl Translator for FailingTranslator {
        fn translate(&self, _request: &TranslationRequest) -> Result<String, TranslationError> {
            Err(TranslationError::EmptyResponse)
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        seen: RefCell<Vec<ProcessOutcome>>,
    }

    impl Reporter for RecordingReporter {
        fn report(&self, outcome: &ProcessOutcome) {
            self.seen.borrow_mut().push(outcome.clone());
        }
    }

    fn executor(dir: &Path) -> SequentialExecutor {
        let runner = CommandRunner::new(Box::new(AllowlistPolicy::default()), dir);
        SequentialExecutor::new(runner, Box::new(JsonHistoryStore::open(dir.join("h.json"))))
    }

    #[test]
    fn executes_translated_commands() {
        let dir = tempdir().unwrap();
        let translator = StaticTranslator::new("mkdir notes\ntouch notes/today.md\n");
        let mut agent = CommandAgent::new(translator, executor(dir.path()));
        let reporter = RecordingReporter::default();

        let outcome = agent.process_command("make a notes folder with today's file", &reporter);

        assert!(outcome.success());
        assert!(dir.path().join("notes/today.md").exists());
        match &outcome {
            ProcessOutcome::Executed {
                interpreted_commands,
                results,
                working_directory,
                ..
            } => {
                assert_eq!(interpreted_commands, &vec!["mkdir notes", "touch notes/today.md"]);
                assert_eq!(results.len(), 2);
                assert_eq!(working_directory.as_path(), dir.path());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(agent.command_history().len(), 2);
        assert_eq!(reporter.seen.borrow().len(), 1);
    }

    #[test]
    fn empty_translation_is_an_error_payload() {
        let dir = tempdir().unwrap();
        let mut agent = CommandAgent::new(StaticTranslator::new("\n  \n"), executor(dir.path()));
        let outcome = agent.process_command("do nothing", &NullReporter);

        assert_eq!(
            outcome,
            ProcessOutcome::Failed {
                original_command: "do nothing".into(),
                error: NO_COMMANDS_ERROR.into(),
                working_directory: dir.path().to_path_buf(),
            }
        );
        assert!(agent.command_history().is_empty());
        assert!(!dir.path().join("h.json").exists());
    }

    #[test]
    fn translation_error_is_reported_without_execution() {
        let dir = tempdir().unwrap();
        let mut agent = CommandAgent::new(FailingTranslator, executor(dir.path()));
        let reporter = RecordingReporter::default();
        let outcome = agent.process_command("list files", &reporter);

        assert!(!outcome.success());
        assert_eq!(outcome.original_command(), "list files");
        assert!(agent.command_history().is_empty());
        assert_eq!(reporter.seen.borrow()[0], outcome);
    }

    #[test]
    fn partial_failure_is_not_success() {
        let dir = tempdir().unwrap();
        let translator = StaticTranslator::new("echo start\nnotallowed now\necho never");
        let mut agent = CommandAgent::new(translator, executor(dir.path()));
        let outcome = agent.process_command("mixed", &NullReporter);

        assert!(!outcome.success());
        assert_eq!(agent.command_history().len(), 2);
        let last = agent.last_result().unwrap();
        assert!(last.output.starts_with("Invalid command:"));
    }

    #[test]
    fn outcome_serializes_with_boundary_field_names() {
        let dir = tempdir().unwrap();
        let mut agent = CommandAgent::new(StaticTranslator::new(""), executor(dir.path()));
        let outcome = agent.process_command("nothing", &NullReporter);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["original_command"], "nothing");
        assert_eq!(json["error"], NO_COMMANDS_ERROR);
        assert!(json.get("working_directory").is_some());
    }
}
