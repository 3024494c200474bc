mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autograde-cli")]
#[command(about = "Autograde CLI - Run and grade submissions from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a source file against a JSON file of test cases
    Grade {
        /// Submission source file
        #[arg(short, long)]
        source: PathBuf,

        /// Test cases: a JSON array, or an object with a `test_cases` array
        #[arg(short, long)]
        tests: PathBuf,

        /// Language identifier (python, javascript, java, cpp, c)
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Skip the remote execution API
        #[arg(long, default_value = "false")]
        local_only: bool,

        /// Print the grading summary as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run a source file once and print its output
    Run {
        /// Source file
        #[arg(short, long)]
        source: PathBuf,

        /// Text fed to the program's stdin
        #[arg(long, default_value = "")]
        stdin: String,

        /// Language identifier
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Time budget in milliseconds (defaults to SANDBOX_TIMEOUT)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Skip the remote execution API
        #[arg(long, default_value = "false")]
        local_only: bool,
    },

    /// List supported languages
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Grade {
            source,
            tests,
            language,
            local_only,
            json,
        } => {
            commands::grade(&source, &tests, &language, local_only, json).await?;
        }
        Commands::Run {
            source,
            stdin,
            language,
            timeout_ms,
            local_only,
        } => {
            commands::run(&source, &stdin, &language, timeout_ms, local_only).await?;
        }
        Commands::Languages => {
            commands::list_languages();
        }
    }

    Ok(())
}
