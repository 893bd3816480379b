use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::{self, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use cmdai::agent::{CommandAgent, ProcessOutcome, Reporter};
use cmdai::config::Config;
use cmdai::executor::SequentialExecutor;
use cmdai::history::{self, HistoryLog};
use cmdai::i18n::I18n;
use cmdai::runner::CommandRunner;
use cmdai::storage::CommandRecord;
use cmdai::translator::{LlmTranslator, StaticTranslator, Translator};

#[derive(Parser)]
#[command(name = "cmdai", version)]
#[command(about = "Run natural-language requests as shell commands")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a request into commands and run them
    Execute {
        /// The natural language request (prompted for when omitted)
        command: Option<String>,
        /// Treat the input as newline-separated shell commands and skip the model
        #[arg(long)]
        commands: bool,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show command execution history
    History {
        /// Only show the most recent N entries
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        /// Print the history as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("CMDAI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::new()?;
    let i18n = I18n::new(&config.get_effective_language());

    match cli.command {
        Commands::Execute {
            command,
            commands,
            json,
        } => {
            let text = match command {
                Some(text) => text,
                None => prompt_for_command(&i18n)?,
            };
            if text.trim().is_empty() {
                bail!(i18n.t("error_empty_request"));
            }

            let success = if commands {
                run_request(StaticTranslator::new(text.clone()), &text, &config, &i18n, json)?
            } else {
                let translator = LlmTranslator::new(config.llm_settings())
                    .context(i18n.t("error_llm_client"))?;
                run_request(translator, &text, &config, &i18n, json)?
            };
            if !success {
                std::process::exit(1);
            }
        }
        Commands::History { limit, json } => {
            let log = history::open(config.history_path(), config.history.format);
            let records = match limit {
                Some(n) => log.recent(n),
                None => log.all(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(records)?);
            } else {
                print_history(records, &i18n);
            }
        }
    }

    Ok(())
}

fn prompt_for_command(i18n: &I18n) -> Result<String> {
    print!("{}", i18n.t("enter_command").bold());
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context(i18n.t("error_read_stdin"))?;
    Ok(input.trim().to_string())
}

fn run_request<T: Translator>(
    translator: T,
    text: &str,
    config: &Config,
    i18n: &I18n,
    json: bool,
) -> Result<bool> {
    let working_dir = std::env::current_dir()?;
    let policy = config
        .execution
        .build_policy()
        .context(i18n.t("error_build_policy"))?;
    let runner = CommandRunner::new(policy, working_dir).with_shell(&config.execution.shell);
    let log = history::open(config.history_path(), config.history.format);
    let mut agent = CommandAgent::new(translator, SequentialExecutor::new(runner, log));

    let outcome = if json {
        agent.process_command(text, &JsonReporter)
    } else {
        println!("\n{} {}\n", i18n.t("processing").blue().bold(), text);
        agent.process_command(text, &ConsoleReporter { i18n })
    };
    Ok(outcome.success())
}

struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, outcome: &ProcessOutcome) {
        match serde_json::to_string_pretty(outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}", e),
        }
    }
}

struct ConsoleReporter<'a> {
    i18n: &'a I18n,
}

impl ConsoleReporter<'_> {
    fn panel(&self, title: &str, working_dir: &Path, body: &str, success: bool) {
        let rule = "─".repeat(60);
        let paint = |s: &str| if success { s.green() } else { s.red() };
        println!("{}", paint(format!("── {} {}", title, rule).as_str()));
        println!(
            "{}: {}\n",
            self.i18n.t("working_directory"),
            working_dir.display()
        );
        println!("{}", body.trim_end());
        println!("{}", paint(rule.as_str()));
    }
}

impl Reporter for ConsoleReporter<'_> {
    fn report(&self, outcome: &ProcessOutcome) {
        let i18n = self.i18n;
        match outcome {
            ProcessOutcome::Failed {
                error,
                working_directory,
                ..
            } => {
                self.panel(&i18n.t("command_result"), working_directory, error, false);
                println!("\n{} {}", i18n.t("error_label").red().bold(), error);
            }
            ProcessOutcome::Executed {
                interpreted_commands,
                results,
                working_directory,
                ..
            } => {
                println!("{}", i18n.t("interpreted").cyan().bold());
                for command in interpreted_commands {
                    println!("  {}", command.yellow());
                }
                println!();

                let total = interpreted_commands.len().to_string();
                for (index, result) in results.iter().enumerate() {
                    let title = format!(
                        "{} · {}",
                        i18n.t_format("step", &[&(index + 1).to_string(), &total]),
                        result.command
                    );
                    self.panel(&title, working_directory, &result.output, result.success);
                }

                let skipped = interpreted_commands.len().saturating_sub(results.len());
                if skipped > 0 {
                    println!(
                        "{}",
                        i18n.t_format("skipped", &[&skipped.to_string()]).yellow()
                    );
                }
                if outcome.success() {
                    println!("\n{}", i18n.t("execution_succeeded").green());
                } else {
                    println!("\n{}", i18n.t("execution_failed").red());
                }
            }
        }
    }
}

fn print_history(records: &[CommandRecord], i18n: &I18n) {
    if records.is_empty() {
        println!("{}", i18n.t("no_history").yellow());
        return;
    }

    println!("\n{}\n", i18n.t("history_title").blue().bold());
    for entry in records {
        let status = if entry.is_success() {
            "success".green()
        } else {
            "error".red()
        };
        let local = entry.timestamp.with_timezone(&chrono::Local);
        println!("{} {}", i18n.t("history_command").bold(), entry.command);
        println!("{} {}", i18n.t("history_status").bold(), status);
        println!(
            "{} {}",
            i18n.t("history_timestamp").bold(),
            local.format("%Y-%m-%d %H:%M:%S")
        );
        let label = if entry.is_success() {
            i18n.t("history_output")
        } else {
            i18n.t("history_error")
        };
        println!("{}\n{}", label.bold(), entry.output.trim_end());
        println!("---");
    }
}
