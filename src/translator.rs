//! Natural language to shell command translation.
//!
//! The model is an untrusted collaborator: whatever it returns is split into
//! candidate lines here and still has to pass the command policy before
//! anything runs.

use crate::error::TranslationError;
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub instruction: String,
    pub working_directory: PathBuf,
    pub platform: String,
}

impl TranslationRequest {
    pub fn new(instruction: &str, working_directory: PathBuf) -> Self {
        Self {
            instruction: instruction.to_string(),
            working_directory,
            platform: current_platform().to_string(),
        }
    }
}

pub trait Translator {
    /// Raw, newline-delimited command text.
    fn translate(&self, request: &TranslationRequest) -> Result<String, TranslationError>;
}

/// Always answers with the same text. Used to run pre-written commands.
pub struct StaticTranslator {
    text: String,
}

impl StaticTranslator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Translator for StaticTranslator {
    fn translate(&self, _request: &TranslationRequest) -> Result<String, TranslationError> {
        Ok(self.text.clone())
    }
}

fn list_marker() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| Regex::new(r"^(?:\d+[.)]|[-*])\s+").ok())
        .as_ref()
}

fn strip_list_marker(line: &str) -> String {
    match list_marker() {
        Some(marker) => marker.replace(line, "").into_owned(),
        None => line.to_string(),
    }
}

// Drops one pair of matching quotes wrapped around the whole line. Quotes
// that belong to arguments are left alone.
fn unquote(line: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if line.len() >= 2 && line.starts_with(quote) && line.ends_with(quote) {
            return &line[1..line.len() - 1];
        }
    }
    line
}

/// Splits model output into command candidates, one per usable line.
pub fn parse_candidates(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .map(strip_list_marker)
        .map(|line| unquote(line.trim()).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn current_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macos",
        "windows" => "windows",
        _ => "linux",
    }
}

/// Advisory command spellings per platform, passed to the model as hints.
#[derive(Debug, Clone, Copy)]
pub struct PlatformHints {
    pub list_dir: &'static str,
    pub create_dir: &'static str,
    pub remove: &'static str,
    pub find_process: &'static str,
    pub kill_process: &'static str,
}

pub fn platform_hints(platform: &str) -> Option<PlatformHints> {
    match platform {
        "macos" | "darwin" | "linux" => Some(PlatformHints {
            list_dir: "ls -la",
            create_dir: "mkdir",
            remove: "rm -rf",
            find_process: "lsof -i",
            kill_process: "kill -9",
        }),
        "windows" | "win32" => Some(PlatformHints {
            list_dir: "dir",
            create_dir: "mkdir",
            remove: "rmdir /s /q",
            find_process: "netstat -ano | findstr",
            kill_process: "taskkill /F /PID",
        }),
        _ => None,
    }
}

const INTERPRETER_SYSTEM: &str = "You are an expert at converting natural language into precise terminal commands. \
You understand the differences between operating systems. Return ONLY the commands, one per line, \
in the order they must run, with no explanations, numbering, or markdown. \
To find a process on a port use `lsof -i :PORT`; to kill it use `kill -9 PID`; \
to find and kill in one step use `lsof -ti :PORT | xargs kill -9`.";

const REVIEWER_SYSTEM: &str = "You are a security reviewer for terminal commands. \
Check each command for dangerous operations, syntax errors, platform compatibility, and \
working-directory assumptions. If a command is safe return it unchanged; otherwise return a safer \
alternative. Return ONLY the commands, one per line, with no explanations or markdown.";

fn interpreter_prompt(request: &TranslationRequest) -> String {
    let mut prompt = format!(
        "Convert this request into terminal commands for a {} system.\n\
         Request: {}\n\
         Current working directory: {}\n\
         Commands run in that directory. Do not use absolute paths unless asked.\n",
        request.platform,
        request.instruction,
        request.working_directory.display()
    );
    if let Some(hints) = platform_hints(&request.platform) {
        prompt.push_str(&format!(
            "Preferred spellings on this platform: list `{}`, create directory `{}`, remove `{}`, \
             find process `{}`, kill process `{}`.\n",
            hints.list_dir, hints.create_dir, hints.remove, hints.find_process, hints.kill_process
        ));
    }
    prompt
}

fn reviewer_prompt(request: &TranslationRequest, interpreted: &str) -> String {
    format!(
        "Review these commands for a {} system.\n\
         Current working directory: {}\n\
         Commands:\n{}\n",
        request.platform,
        request.working_directory.display(),
        interpreted.trim()
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Two-stage model pipeline: interpret the request, then review the result.
pub struct LlmTranslator {
    client: Client,
    settings: LlmSettings,
    api_format: ApiFormat,
}

impl LlmTranslator {
    pub fn new(settings: LlmSettings) -> Result<Self, TranslationError> {
        if settings.api_key.trim().is_empty() {
            return Err(TranslationError::MissingApiKey);
        }
        let client = Client::builder().timeout(settings.timeout).build()?;
        let api_format = Self::detect_api_format(&settings.api_url);
        Ok(Self {
            client,
            settings,
            api_format,
        })
    }

    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }

    fn complete(&self, system: &str, user: &str) -> Result<String, TranslationError> {
        debug!(model = %self.settings.model, "requesting completion");
        match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(system, user),
            ApiFormat::OpenAI => self.complete_openai(system, user),
        }
    }

    fn complete_anthropic(&self, system: &str, user: &str) -> Result<String, TranslationError> {
        let request = AnthropicRequest {
            model: self.settings.model.clone(),
            max_tokens: 1024,
            temperature: self.settings.temperature,
            system: system.into(),
            messages: vec![Message {
                role: "user".into(),
                content: user.into(),
            }],
        };

        let response = self
            .client
            .post(&self.settings.api_url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranslationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: AnthropicResponse = response.json()?;
        completion
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(TranslationError::EmptyResponse)
    }

    fn complete_openai(&self, system: &str, user: &str) -> Result<String, TranslationError> {
        let request = OpenAIRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: system.into(),
                },
                Message {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.settings.api_url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranslationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: OpenAIResponse = response.json()?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(TranslationError::EmptyResponse)
    }
}

impl Translator for LlmTranslator {
    fn translate(&self, request: &TranslationRequest) -> Result<String, TranslationError> {
        let interpreted = self.complete(INTERPRETER_SYSTEM, &interpreter_prompt(request))?;
        debug!(%interpreted, "interpreter output");
        if parse_candidates(&interpreted).is_empty() {
            return Ok(interpreted);
        }
        let reviewed = self.complete(REVIEWER_SYSTEM, &reviewer_prompt(request, &interpreted))?;
        debug!(%reviewed, "reviewer output");
        Ok(reviewed)
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str, key: &str) -> LlmSettings {
        LlmSettings {
            api_key: key.into(),
            api_url: url.into(),
            model: "test-model".into(),
            temperature: 0.7,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn candidates_skip_blank_lines_and_strip_quotes() {
        let raw = "  \"mkdir build\"  \n\n'cd build'\n   \n`ls -la`\n";
        assert_eq!(parse_candidates(raw), vec!["mkdir build", "cd build", "ls -la"]);
    }

    #[test]
    fn candidates_ignore_code_fences_and_list_markers() {
        let raw = "```bash\n1. mkdir out\n2) touch out/a.txt\n- ls out\n```";
        assert_eq!(
            parse_candidates(raw),
            vec!["mkdir out", "touch out/a.txt", "ls out"]
        );
    }

    #[test]
    fn candidates_keep_quoted_arguments() {
        let raw = "find . -name \"*.rs\"\necho 'done'\n- grep -r `whoami` .";
        assert_eq!(
            parse_candidates(raw),
            vec!["find . -name \"*.rs\"", "echo 'done'", "grep -r `whoami` ."]
        );
    }

    #[test]
    fn candidates_unwrap_only_matching_outer_quotes() {
        assert_eq!(parse_candidates("\"echo 'hi'\""), vec!["echo 'hi'"]);
        assert_eq!(parse_candidates("'ls\""), vec!["'ls\""]);
    }

    #[test]
    fn candidates_keep_flags_that_look_like_markers() {
        assert_eq!(parse_candidates("ls -la"), vec!["ls -la"]);
        assert_eq!(parse_candidates("kill -9 123"), vec!["kill -9 123"]);
    }

    #[test]
    fn blank_output_has_no_candidates() {
        assert!(parse_candidates("").is_empty());
        assert!(parse_candidates("\n  \n\"\"\n").is_empty());
    }

    #[test]
    fn static_translator_echoes_text() {
        let translator = StaticTranslator::new("echo hi");
        let request = TranslationRequest::new("say hi", PathBuf::from("/tmp"));
        assert_eq!(translator.translate(&request).unwrap(), "echo hi");
    }

    #[test]
    fn prompt_carries_context_and_hints() {
        let request = TranslationRequest {
            instruction: "list files".into(),
            working_directory: PathBuf::from("/srv/app"),
            platform: "windows".into(),
        };
        let prompt = interpreter_prompt(&request);
        assert!(prompt.contains("list files"));
        assert!(prompt.contains("/srv/app"));
        assert!(prompt.contains("taskkill /F /PID"));
    }

    #[test]
    fn unknown_platform_has_no_hints() {
        assert!(platform_hints("plan9").is_none());
        assert!(platform_hints(current_platform()).is_some());
    }

    #[test]
    fn detects_api_format_from_url() {
        let t = LlmTranslator::new(settings("https://api.anthropic.com/v1/messages", "k")).unwrap();
        assert_eq!(t.api_format, ApiFormat::Anthropic);
        let t = LlmTranslator::new(settings("https://api.openai.com/v1/chat/completions", "k")).unwrap();
        assert_eq!(t.api_format, ApiFormat::OpenAI);
    }

    #[test]
    fn missing_key_is_rejected() {
        let result = LlmTranslator::new(settings("https://api.openai.com/v1/chat/completions", " "));
        assert!(matches!(result, Err(TranslationError::MissingApiKey)));
    }
}
