//! Interactive command-line surface.
//!
//! Reserved keywords (`help`, `history`, `logs`, `metrics`, `status`,
//! `pending`, `last_intent`, `explain`, `exit`/`quit`, `simulate <cmd>`)
//! are handled here; everything else flows through the pipeline.

use clap::{Arg, ArgAction, Command as ClapCommand};
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use warden_core::advisor::NullAdvisor;
use warden_core::{Pipeline, WardenConfig};
use warden_exec::Confirmer;
use warden_intent::embedding::{EmbeddingBackend, EmbeddingError};

/// Embedding backend used when no model is wired in: never loads, which
/// degrades the router to its unknown fallback and the cascade continues
/// with the rule-based stages.
struct UnavailableBackend;

#[async_trait::async_trait]
impl EmbeddingBackend for UnavailableBackend {
    async fn load(&self) -> Result<(), EmbeddingError> {
        Err(EmbeddingError::LoadFailed("no embedding model configured".into()))
    }

    fn unload(&self) {}

    fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::NotLoaded)
    }
}

/// Confirmation prompt on stdin.
struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

const HELP_TEXT: &str = "\
Commands:
  <free-form command>    e.g. 'create file notes.txt', 'open https://example.com'
  simulate <command>     dry-run: classify, plan, and simulate without executing
  history                recent commands
  logs                   recent plan executions
  metrics                internal decision metrics
  status                 pipeline status
  pending                outstanding clarification details
  last_intent            last successful intent as JSON
  explain                current decision state
  exit | quit            leave
";

#[tokio::main]
async fn main() -> ExitCode {
    let matches = ClapCommand::new("warden")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Governed command pipeline")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("auto-confirm")
                .long("auto-confirm")
                .action(ArgAction::SetTrue)
                .help("Pre-grant every confirmation prompt (use with care)"),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = match matches.get_one::<String>("config") {
        Some(path) => match WardenConfig::load(path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("fatal: {error}");
                return ExitCode::FAILURE;
            }
        },
        None => WardenConfig::default(),
    };
    let auto_confirm = matches.get_flag("auto-confirm");

    let mut pipeline = match Pipeline::new(
        config,
        Arc::new(NullAdvisor),
        Arc::new(UnavailableBackend),
        Arc::new(StdinConfirmer),
    ) {
        Ok(pipeline) => pipeline,
        Err(error) => {
            eprintln!("fatal: pipeline initialization failed: {error}");
            return ExitCode::FAILURE;
        }
    };

    println!("warden {} (type 'help' for commands)", env!("CARGO_PKG_VERSION"));
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(error) => {
                eprintln!("input error: {error}");
                break;
            }
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => break,
            "help" => {
                println!("{HELP_TEXT}");
                continue;
            }
            "history" => {
                for (command, success) in pipeline.history(Some(10)) {
                    println!("{} {}", if success { "ok " } else { "err" }, command);
                }
                continue;
            }
            "logs" => {
                for record in pipeline.logs(Some(10)) {
                    println!(
                        "{} plan={} {}ms {}",
                        if record.success { "ok " } else { "err" },
                        record.plan_id,
                        record.duration_ms,
                        record.command
                    );
                }
                continue;
            }
            _ => {}
        }

        let result = if let Some(rest) = input.strip_prefix("simulate ") {
            pipeline.simulate_command(rest.trim()).await
        } else {
            pipeline.process_command(input, auto_confirm).await
        };
        println!("{}", result.output);
    }

    println!("Goodbye.");
    ExitCode::SUCCESS
}
