//! Gatekeeping for generated commands.
//!
//! A [`CommandPolicy`] decides whether a shell line may run at all. The
//! default [`AllowlistPolicy`] only looks at the leading program name, so an
//! allowed program with destructive arguments still passes. Stricter
//! policies plug in behind the same trait without touching the executor.

use crate::bash_parser::BashParser;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Mutex;

pub const MAX_COMMAND_LENGTH: usize = 1000;

pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    // Unix/Linux/macOS
    "ls", "dir", "cd", "mkdir", "rm", "cp", "mv", "touch", "cat", "echo", "grep", "find",
    "chmod", "chown",
    // Windows
    "rmdir", "del", "copy", "move", "type", "rd", "xcopy",
    // Common
    "pwd", "clear", "cls", "whoami", "date", "time",
    // Processes
    "lsof", "kill", "ps", "top", "xargs", "pkill", "killall", "netstat", "taskkill", "tasklist",
    // Network
    "ping", "traceroute", "dig", "nslookup", "whois", "curl", "wget",
];

/// A command line split into the pieces a policy inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub raw: String,
    /// First whitespace-delimited token, lowercased. `None` for blank input.
    pub program: Option<String>,
    pub args: Vec<String>,
}

impl ParsedCommand {
    pub fn parse(raw: &str) -> Self {
        let mut tokens = raw.split_whitespace();
        let program = tokens.next().map(|t| t.to_lowercase());
        let args = tokens.map(str::to_string).collect();
        Self {
            raw: raw.to_string(),
            program,
            args,
        }
    }

    /// Length in characters, not bytes.
    pub fn len(&self) -> usize {
        self.raw.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Rejected(String),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    pub fn reason(&self) -> &str {
        match self {
            Verdict::Allowed => "Command is valid",
            Verdict::Rejected(reason) => reason,
        }
    }
}

pub trait CommandPolicy {
    fn evaluate(&self, command: &ParsedCommand) -> Verdict;

    fn validate(&self, command: &str) -> Verdict {
        self.evaluate(&ParsedCommand::parse(command))
    }
}

/// Name-based gate on the leading token plus a length bound.
#[derive(Debug, Clone)]
pub struct AllowlistPolicy {
    allowed: HashSet<String>,
    max_length: usize,
}

impl AllowlistPolicy {
    pub fn new<I, S>(allowed: I, max_length: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            max_length,
        }
    }

    pub fn is_allowed_program(&self, program: &str) -> bool {
        self.allowed.contains(&program.to_lowercase())
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn check_length(&self, command: &ParsedCommand) -> Option<Verdict> {
        if command.len() > self.max_length {
            return Some(Verdict::Rejected(format!(
                "Command exceeds maximum length of {} characters",
                self.max_length
            )));
        }
        None
    }

    fn check_program(&self, program: &str) -> Verdict {
        if self.is_allowed_program(program) {
            Verdict::Allowed
        } else {
            Verdict::Rejected(format!(
                "Command '{}' is not in the allowed commands list",
                program.to_lowercase()
            ))
        }
    }
}

impl Default for AllowlistPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_COMMANDS.iter(), MAX_COMMAND_LENGTH)
    }
}

impl CommandPolicy for AllowlistPolicy {
    fn evaluate(&self, command: &ParsedCommand) -> Verdict {
        if let Some(rejection) = self.check_length(command) {
            return rejection;
        }
        match &command.program {
            None => Verdict::Rejected("Command is empty".to_string()),
            Some(program) => self.check_program(program),
        }
    }
}

/// Applies the allowlist to every program in a pipeline or list, not just
/// the first one.
pub struct PipelinePolicy {
    allowlist: AllowlistPolicy,
    parser: Mutex<BashParser>,
}

impl PipelinePolicy {
    pub fn new(allowlist: AllowlistPolicy) -> Result<Self> {
        Ok(Self {
            allowlist,
            parser: Mutex::new(BashParser::new()?),
        })
    }

    fn programs(&self, command: &ParsedCommand) -> Vec<String> {
        let mut parser = self.parser.lock().unwrap_or_else(|e| e.into_inner());
        parser.command_names(&command.raw)
    }
}

impl CommandPolicy for PipelinePolicy {
    fn evaluate(&self, command: &ParsedCommand) -> Verdict {
        if let Some(rejection) = self.allowlist.check_length(command) {
            return rejection;
        }
        if command.is_empty() {
            return Verdict::Rejected("Command is empty".to_string());
        }
        // Lines with no recognisable program (bare assignments, arithmetic,
        // unparseable input) are refused rather than judged by their first word.
        let programs = self.programs(command);
        if programs.is_empty() {
            return Verdict::Rejected("Command could not be parsed into any program".to_string());
        }
        for program in programs {
            let verdict = self.allowlist.check_program(&program);
            if !verdict.is_allowed() {
                return verdict;
            }
        }
        Verdict::Allowed
    }
}
