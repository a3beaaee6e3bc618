//! paperforge CLI: generate exam papers from a question bank and grade answers.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "paperforge",
    version,
    about = "Blueprint-driven exam paper generation and grading"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a paper
    Generate {
        /// Subject, e.g. "mathematics"
        #[arg(long)]
        subject: String,

        /// Grade level
        #[arg(long)]
        grade: u32,

        /// Paper label, e.g. "p1" or "Paper 2"
        #[arg(long)]
        paper: Option<String>,

        /// Past-paper year filter
        #[arg(long)]
        year: Option<i32>,

        /// Past-paper season filter, e.g. "november"
        #[arg(long)]
        season: Option<String>,

        /// Mode: standard, quick_practice, by_topic, full_exam
        #[arg(long)]
        mode: Option<String>,

        /// Minutes available (quick practice)
        #[arg(long)]
        duration: Option<u32>,

        /// Topic to practise (by_topic mode)
        #[arg(long)]
        topic: Option<String>,

        /// Number of questions (by_topic mode)
        #[arg(long)]
        count: Option<u32>,

        /// Seed for reproducible topic practice
        #[arg(long)]
        seed: Option<String>,

        /// Question ids to leave out (comma-separated)
        #[arg(long)]
        exclude: Option<String>,

        /// Selection strategy: marks_only, balanced
        #[arg(long)]
        strategy: Option<String>,

        /// Question bank JSON file (overrides the configured store)
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the paper as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: table, json, markdown
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Grade a set of answers
    Grade {
        /// JSON file with `submissions` and optional metadata
        #[arg(long)]
        answers: PathBuf,

        /// Save the graded result for this user
        #[arg(long)]
        user: Option<String>,

        /// Question bank JSON file (overrides the configured store)
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Check how well the bank covers a blueprint
    Coverage {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        grade: u32,

        #[arg(long)]
        paper: Option<String>,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        season: Option<String>,

        /// Question bank JSON file (overrides the configured store)
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Validate a question bank file
    Validate {
        /// Path to the question bank JSON file
        #[arg(long)]
        bank: PathBuf,
    },

    /// Create a starter config and sample question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("paperforge=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            subject,
            grade,
            paper,
            year,
            season,
            mode,
            duration,
            topic,
            count,
            seed,
            exclude,
            strategy,
            bank,
            config,
            output,
            format,
        } => {
            let request = commands::generate::build_request(
                subject, grade, paper, year, season, mode, duration, topic, count, seed, exclude,
            );
            commands::generate::execute(request, strategy, bank, config, output, format).await
        }
        Commands::Grade {
            answers,
            user,
            bank,
            config,
            format,
        } => commands::grade::execute(answers, user, bank, config, format).await,
        Commands::Coverage {
            subject,
            grade,
            paper,
            year,
            season,
            bank,
            config,
            format,
        } => {
            commands::coverage::execute(subject, grade, paper, year, season, bank, config, format)
                .await
        }
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
