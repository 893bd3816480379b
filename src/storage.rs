use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Success,
    Error,
}

/// One attempted command, as kept in the history file.
///
/// On disk the text lives under `output` for successful runs and under
/// `error` otherwise, so the file stays readable by older tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordRepr", from = "RecordRepr")]
pub struct CommandRecord {
    pub command: String,             // Command attempted, verbatim
    pub status: CommandStatus,       // success | error
    pub output: String,              // stdout, or the error text on failure
    pub timestamp: DateTime<Utc>,    // Attempt time
    pub working_directory: PathBuf,  // Directory the command ran (or would have run) in
}

impl CommandRecord {
    pub fn success(command: &str, stdout: String, working_directory: PathBuf) -> Self {
        Self {
            command: command.to_string(),
            status: CommandStatus::Success,
            output: stdout,
            timestamp: Utc::now(),
            working_directory,
        }
    }

    pub fn error(command: &str, message: String, working_directory: PathBuf) -> Self {
        Self {
            command: command.to_string(),
            status: CommandStatus::Error,
            output: message,
            timestamp: Utc::now(),
            working_directory,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }
}

// Field order here is the field order in the file.
#[derive(Serialize, Deserialize)]
struct RecordRepr {
    command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: DateTime<Utc>,
    status: CommandStatus,
    working_directory: PathBuf,
}

impl From<CommandRecord> for RecordRepr {
    fn from(record: CommandRecord) -> Self {
        let (output, error) = match record.status {
            CommandStatus::Success => (Some(record.output), None),
            CommandStatus::Error => (None, Some(record.output)),
        };
        Self {
            command: record.command,
            output,
            error,
            timestamp: record.timestamp,
            status: record.status,
            working_directory: record.working_directory,
        }
    }
}

impl From<RecordRepr> for CommandRecord {
    fn from(repr: RecordRepr) -> Self {
        let output = match repr.status {
            CommandStatus::Success => repr.output.or(repr.error),
            CommandStatus::Error => repr.error.or(repr.output),
        };
        Self {
            command: repr.command,
            status: repr.status,
            output: output.unwrap_or_default(),
            timestamp: repr.timestamp,
            working_directory: repr.working_directory,
        }
    }
}

/// Outcome of one command inside a sequence run. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub command: String,
    pub success: bool,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn new(command: &str, success: bool, output: String) -> Self {
        Self {
            command: command.to_string(),
            success,
            output,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_record_writes_output_key() {
        let record = CommandRecord::success("ls", "a\nb\n".into(), PathBuf::from("/tmp"));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"output\":\"a\\nb\\n\""));
        assert!(!json.contains("\"error\""));
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"working_directory\":\"/tmp\""));
    }

    #[test]
    fn error_record_writes_error_key() {
        let record = CommandRecord::error("rm x", "boom".into(), PathBuf::from("/tmp"));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"error\":\"boom\""));
        assert!(!json.contains("\"output\""));
        assert!(json.contains("\"status\":\"error\""));
    }

    #[test]
    fn field_order_is_stable() {
        let record = CommandRecord::success("pwd", "/\n".into(), PathBuf::from("/"));
        let json = serde_json::to_string_pretty(&record).unwrap();
        let pos = |key: &str| json.find(&format!("\"{}\"", key)).unwrap();
        assert!(pos("command") < pos("output"));
        assert!(pos("output") < pos("timestamp"));
        assert!(pos("timestamp") < pos("status"));
        assert!(pos("status") < pos("working_directory"));
    }

    #[test]
    fn reads_record_written_by_hand() {
        let json = r#"{
            "command": "cat missing",
            "error": "Command failed with error: no such file",
            "timestamp": "2024-03-01T10:00:00Z",
            "status": "error",
            "working_directory": "/home/user"
        }"#;
        let record: CommandRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, CommandStatus::Error);
        assert_eq!(record.output, "Command failed with error: no such file");
        assert!(!record.is_success());
    }

    #[test]
    fn record_without_text_loads_empty() {
        let json = r#"{"command":"clear","timestamp":"2024-03-01T10:00:00Z","status":"success","working_directory":"/"}"#;
        let record: CommandRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.output, "");
    }
}
