use application::rag_service::{AskOutcome, IngestReport, RagService};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Input;
use infrastructure::config::Config;
use shared::confirmation::confirm_overwrite;
use shared::types::Result;
use shared::utils::preview;
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE: &str = "https://lilianweng.github.io/posts/2023-06-23-agent/";

/// Retrieval-augmented question answering over web pages and local files.
#[derive(Parser, Debug)]
#[command(name = "ragkit", version)]
#[command(about = "Answer questions from web pages and local files with retrieval-augmented generation", long_about = None)]
pub struct Cli {
    /// Enable info-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load, chunk and embed sources, optionally saving the index
    Ingest {
        /// URLs, files or directories
        #[arg(required = true)]
        locators: Vec<String>,

        /// Write the index to this SQLite file
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Overwrite an existing snapshot without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Answer a single question
    Ask {
        /// Source to ingest before answering (repeatable)
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Read the index from this SQLite file instead of ingesting
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Print the retrieved chunks with their scores
        #[arg(long)]
        show_context: bool,

        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Ingest once, then answer questions until an empty line
    Chat {
        #[arg(long = "source")]
        sources: Vec<String>,

        #[arg(long)]
        snapshot: Option<PathBuf>,

        #[arg(long)]
        show_context: bool,
    },
}

pub struct CliApp {
    config: Config,
}

impl CliApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&mut self, cli: Cli) -> Result<()> {
        let service = RagService::from_config(&self.config)?;
        match cli.command {
            Command::Ingest {
                locators,
                snapshot,
                yes,
            } => {
                if let Some(path) = &snapshot {
                    if !confirm_overwrite(path, yes)? {
                        println!("{}", "Aborted; snapshot left unchanged.".yellow());
                        return Ok(());
                    }
                }
                let report = service.ingest(&locators).await?;
                print_report(&report);
                if let Some(path) = snapshot {
                    let saved = service.save_snapshot(&path).await?;
                    println!("Saved {} entries to {}", saved, path.display().to_string().bold());
                }
            }
            Command::Ask {
                sources,
                snapshot,
                show_context,
                question,
            } => {
                prepare(&service, sources, snapshot.as_deref()).await?;
                let outcome = service.ask(&question.join(" ")).await?;
                print_outcome(&outcome, show_context);
            }
            Command::Chat {
                sources,
                snapshot,
                show_context,
            } => {
                prepare(&service, sources, snapshot.as_deref()).await?;
                loop {
                    let question: String = Input::new()
                        .with_prompt("Question (empty to quit)")
                        .allow_empty(true)
                        .interact_text()?;
                    if question.trim().is_empty() {
                        break;
                    }
                    match service.ask(question.trim()).await {
                        Ok(outcome) => print_outcome(&outcome, show_context),
                        // One failed query does not end the session or touch the index.
                        Err(err) => eprintln!("{} {}", "error:".red().bold(), err),
                    }
                }
            }
        }
        Ok(())
    }
}

/// Where the index for `ask`/`chat` comes from.
#[derive(Debug, PartialEq, Eq)]
enum Preparation {
    /// An existing snapshot wins; `ignored` lists `--source` values it makes redundant.
    Restore { path: PathBuf, ignored: Vec<String> },
    Ingest { sources: Vec<String>, save_to: Option<PathBuf> },
}

fn plan_preparation(sources: Vec<String>, snapshot: Option<&Path>) -> Preparation {
    match snapshot {
        Some(path) if path.exists() => Preparation::Restore {
            path: path.to_path_buf(),
            ignored: sources,
        },
        _ => Preparation::Ingest {
            sources: if sources.is_empty() {
                vec![DEFAULT_SOURCE.to_string()]
            } else {
                sources
            },
            save_to: snapshot.map(Path::to_path_buf),
        },
    }
}

async fn prepare(service: &RagService, sources: Vec<String>, snapshot: Option<&Path>) -> Result<()> {
    match plan_preparation(sources, snapshot) {
        Preparation::Restore { path, ignored } => {
            if !ignored.is_empty() {
                eprintln!(
                    "{} snapshot {} exists; ignoring --source {}",
                    "warning:".yellow().bold(),
                    path.display(),
                    ignored.join(", ")
                );
            }
            let restored = service.load_snapshot(&path).await?;
            println!("Loaded {} indexed chunks from {}", restored, path.display());
        }
        Preparation::Ingest { sources, save_to } => {
            let report = service.ingest(&sources).await?;
            print_report(&report);
            if let Some(path) = save_to {
                service.save_snapshot(&path).await?;
            }
        }
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!(
        "{} {} chunks from {} document(s), {} characters in {:.1}s",
        "Indexed".green().bold(),
        report.chunk_ids.len(),
        report.documents,
        report.total_chars,
        report.elapsed.as_secs_f32()
    );
    let first: Vec<String> = report.chunk_ids.iter().take(3).map(|id| id.to_string()).collect();
    println!("  first ids: {}", first.join(", ").dimmed());
}

fn print_outcome(outcome: &AskOutcome, show_context: bool) {
    if show_context {
        for (rank, hit) in outcome.context.iter().enumerate() {
            println!(
                "{} {} {}",
                format!("[{}]", rank + 1).cyan(),
                format!("{:.3}", hit.score).yellow(),
                hit.chunk.id.to_string().dimmed()
            );
            println!("    {}", preview(&hit.chunk.content, 160).replace('\n', " "));
        }
        println!();
    }
    println!("{}", outcome.answer.text.trim());
}
