use crate::error::HistoryError;
use crate::history::HistoryLog;
use crate::policy::{CommandPolicy, Verdict};
use crate::storage::CommandRecord;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

pub const FAILURE_PREFIX: &str = "Command failed with error:";

#[cfg(windows)]
pub const DEFAULT_SHELL: &str = "cmd";
#[cfg(not(windows))]
pub const DEFAULT_SHELL: &str = "sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The policy refused the command; nothing was spawned.
    Rejected { reason: String },
    Succeeded { stdout: String },
    /// Spawn failure or non-zero exit.
    Failed { message: String },
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }

    pub fn output(&self) -> &str {
        match self {
            RunOutcome::Rejected { reason } => reason,
            RunOutcome::Succeeded { stdout } => stdout,
            RunOutcome::Failed { message } => message,
        }
    }
}

struct Captured {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Runs single shell commands in a fixed directory and records every attempt.
pub struct CommandRunner {
    policy: Box<dyn CommandPolicy>,
    shell: String,
    working_dir: PathBuf,
}

impl CommandRunner {
    pub fn new(policy: Box<dyn CommandPolicy>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            shell: DEFAULT_SHELL.to_string(),
            working_dir: working_dir.into(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn validate(&self, command: &str) -> Verdict {
        self.policy.validate(command)
    }

    /// Validates, runs, and appends exactly one record to `history`.
    ///
    /// Every execution outcome comes back as a [`RunOutcome`]; only a failure
    /// to persist the record is an error.
    pub fn run(
        &self,
        command: &str,
        history: &mut dyn HistoryLog,
    ) -> Result<RunOutcome, HistoryError> {
        let outcome = match self.validate(command) {
            Verdict::Rejected(reason) => {
                debug!(command, %reason, "command rejected");
                RunOutcome::Rejected { reason }
            }
            Verdict::Allowed => self.spawn_and_wait(command),
        };

        let record = match &outcome {
            RunOutcome::Succeeded { stdout } => {
                CommandRecord::success(command, stdout.clone(), self.working_dir.clone())
            }
            other => {
                CommandRecord::error(command, other.output().to_string(), self.working_dir.clone())
            }
        };
        history.append(record)?;
        Ok(outcome)
    }

    fn spawn_and_wait(&self, command: &str) -> RunOutcome {
        info!(command, cwd = %self.working_dir.display(), "running command");
        match self.capture(command) {
            Ok(captured) if captured.status.success() => RunOutcome::Succeeded {
                stdout: captured.stdout,
            },
            Ok(captured) => {
                debug!(command, status = ?captured.status.code(), "command exited non-zero");
                RunOutcome::Failed {
                    message: format!("{} {}", FAILURE_PREFIX, captured.stderr),
                }
            }
            Err(e) => RunOutcome::Failed {
                message: format!("Failed to execute command: {}", e),
            },
        }
    }

    fn capture(&self, command: &str) -> io::Result<Captured> {
        let mut child = self
            .shell_command(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes concurrently so a chatty stderr cannot block stdout.
        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let status = child.wait()?;
        let stdout = join(stdout_handle)?;
        let stderr = join(stderr_handle)?;

        Ok(Captured {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    fn shell_command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        if cfg!(windows) && self.shell.eq_ignore_ascii_case("cmd") {
            cmd.arg("/C");
        } else {
            cmd.arg("-c");
        }
        cmd.arg(command);
        cmd
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut collected = Vec::new();
        if let Some(mut reader) = pipe {
            reader.read_to_end(&mut collected)?;
        }
        Ok(collected)
    })
}

fn join(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader thread panicked"))?
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::history::JsonHistoryStore;
    use crate::policy::AllowlistPolicy;
    use crate::storage::CommandStatus;
    use tempfile::tempdir;

    fn runner(dir: &Path) -> CommandRunner {
        CommandRunner::new(Box::new(AllowlistPolicy::default()), dir)
    }

    #[test]
    fn captures_stdout_on_success() {
        let dir = tempdir().unwrap();
        let mut history = JsonHistoryStore::open(dir.path().join("h.json"));
        let outcome = runner(dir.path()).run("echo hello", &mut history).unwrap();

        assert_eq!(outcome, RunOutcome::Succeeded { stdout: "hello\n".into() });
        assert_eq!(history.len(), 1);
        let record = &history.all()[0];
        assert_eq!(record.status, CommandStatus::Success);
        assert_eq!(record.output, "hello\n");
        assert_eq!(record.working_directory, dir.path());
    }

    #[test]
    fn runs_in_configured_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let mut history = JsonHistoryStore::open(dir.path().join("h.json"));
        let outcome = runner(dir.path()).run("ls", &mut history).unwrap();
        assert!(outcome.success());
        assert!(outcome.output().contains("marker.txt"));
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let dir = tempdir().unwrap();
        let mut history = JsonHistoryStore::open(dir.path().join("h.json"));
        let outcome = runner(dir.path())
            .run("ls ./definitely-not-here", &mut history)
            .unwrap();

        assert!(!outcome.success());
        assert!(outcome.output().starts_with(FAILURE_PREFIX));
        assert!(outcome.output().contains("definitely-not-here"));
        assert_eq!(history.all()[0].status, CommandStatus::Error);
    }

    #[test]
    fn rejected_command_is_recorded_but_not_spawned() {
        let dir = tempdir().unwrap();
        let mut history = JsonHistoryStore::open(dir.path().join("h.json"));
        let outcome = runner(dir.path())
            .run("touchy > spawned.txt", &mut history)
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Rejected { .. }));
        assert!(outcome.output().contains("touchy"));
        assert!(!dir.path().join("spawned.txt").exists());
        assert_eq!(history.len(), 1);
        assert_eq!(history.all()[0].status, CommandStatus::Error);
    }

    #[test]
    fn missing_shell_is_an_outcome_not_a_panic() {
        let dir = tempdir().unwrap();
        let mut history = JsonHistoryStore::open(dir.path().join("h.json"));
        let outcome = runner(dir.path())
            .with_shell("/nonexistent/shell")
            .run("echo hi", &mut history)
            .unwrap();

        assert!(!outcome.success());
        assert!(outcome.output().starts_with("Failed to execute command:"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn history_write_failure_is_returned() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let mut history = JsonHistoryStore::open(blocker.join("h.json"));
        let result = runner(dir.path()).run("echo hi", &mut history);
        assert!(result.is_err());
    }
}
