use anyhow::Result;
use clap::{Parser, Subcommand};
use nl2sql_dashboard::config::{log_filter, ConfigArgs};
use nl2sql_dashboard::dashboard::{AskOutcome, Dashboard};
use nl2sql_dashboard::llm::model_from_config;
use nl2sql_dashboard::render::render_table;

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Ask a SQLite database questions in natural language")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate SQL for a question, run it and print the rows
    Ask {
        /// The question in natural language
        question: String,
    },
    /// Print the schema text the model is prompted with
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.load()?;
    let model = model_from_config(&config, cli.config.fixed_response.clone());
    let dashboard = Dashboard::open(&config, model)?;

    match cli.command {
        Command::Schema => {
            print!("{}", dashboard.schema().await?.render());
        }
        Command::Ask { question } => {
            let response = dashboard.ask(&question).await;
            if let Some(sql) = response.outcome.sql() {
                println!("{}\n", sql);
            }
            match &response.outcome {
                AskOutcome::Answered { result, .. } => {
                    println!("{}", render_table(result));
                    println!("{} rows in {} ms", result.row_count, result.execution_time_ms);
                }
                failed => {
                    if let Some(line) = failed.error_line() {
                        eprintln!("{}", line);
                    }
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
