use anyhow::{Context, Result};
use clap::Parser;
use nl2sql::execution_loop::{QueryRequest, WorkflowEngine};
use nl2sql::llm::{ChatTurn, ProviderRegistry};
use nl2sql::security::resolve_db_path;
use nl2sql::{schema_inspector, AppConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Answer natural-language questions with read-only SQL over a SQLite database")]
struct Args {
    /// The question in natural language
    question: String,

    /// SQLite database to query
    #[arg(long)]
    db: PathBuf,

    /// LLM configuration file
    #[arg(short, long, default_value = "config/llm_config.yaml")]
    config: PathBuf,

    /// Provider override (openai, gemini, groq, mistral)
    #[arg(long)]
    provider: Option<String>,

    /// Model override for the selected provider
    #[arg(long)]
    model: Option<String>,

    /// JSON file with prior turns: [{"role": "user", "content": "..."}]
    #[arg(long)]
    history: Option<PathBuf>,

    /// Only allow databases inside this directory
    #[arg(long)]
    databases_dir: Option<PathBuf>,

    /// Print the schema description and exit
    #[arg(long)]
    schema_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let db_path = match &args.databases_dir {
        Some(dir) => resolve_db_path(dir, &args.db.to_string_lossy())?,
        None => args.db.clone(),
    };

    if args.schema_only {
        let schema = schema_inspector::describe(&db_path)?;
        print!("{}", schema);
        return Ok(());
    }

    let chat_history: Vec<ChatTurn> = match &args.history {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read history file {}", path.display()))?;
            serde_json::from_str(&contents).context("History file must be a JSON array of turns")?
        }
        None => Vec::new(),
    };

    let config = Arc::new(AppConfig::load_or_default(&args.config)?);
    let engine = WorkflowEngine::from_config(config, ProviderRegistry::with_builtin())?;
    info!("Workflow engine ready (max_retries: {})", engine.max_retries());

    let request = QueryRequest::new(args.question, db_path)
        .with_history(chat_history)
        .with_model(args.provider, args.model);
    let outcome = engine.run(request).await?;

    println!("{}", serde_json::to_string_pretty(&outcome.to_response())?);
    if let Some(err) = outcome.error() {
        error!("Query failed ({}): {}", err.status_code(), err);
        std::process::exit(1);
    }
    Ok(())
}
