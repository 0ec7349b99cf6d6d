//! claimguard-agent - interactive claim analysis shell
//!
//! `analyze <claim_id>` runs Stage-2 on one claim; any other input is
//! answered by the hosted chat model with retrieved documents as context.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use claimguard_agent::llm_client::{API_KEY_ENV, DEFAULT_MODEL};
use claimguard_agent::rag::extract_claim_ids;
use claimguard_agent::repl::{parse_command, Command};
use claimguard_agent::{OpenRouterClient, RagAgent};
use claimguard_common::config::{default_config_path, RootFolderResolver, TomlConfig};
use claimguard_common::PipelineConfig;
use claimguard_server::services::vector_index;
use claimguard_server::services::{
    ClaimAnalyzer, Embedder, HashingEmbedder, IndexRetriever, ResilientRetriever, Retriever,
    UnavailableRetriever,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MODULE_NAME: &str = "claimguard-agent";

#[derive(Debug, Parser)]
#[command(name = "claimguard-agent", version, about = "Interactive RAG agent for claim analysis")]
struct Args {
    /// Root folder holding the claim store and document index
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Chat model identifier
    #[arg(long)]
    model: Option<String>,

    /// Chunks retrieved per question
    #[arg(short = 'k', long = "top-k", default_value_t = 5)]
    k: usize,

    /// TOML config file (default: <config_dir>/claimguard/claimguard-agent.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| default_config_path(MODULE_NAME));
    let toml_config = config_path
        .as_deref()
        .map(TomlConfig::load_or_default)
        .unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let api_key = std::env::var(API_KEY_ENV)
        .ok()
        .or_else(|| toml_config.llm.api_key.clone())
        .with_context(|| format!("Missing {}. Set it in your .env file.", API_KEY_ENV))?;

    let model = args
        .model
        .or_else(|| toml_config.llm.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let mut llm = OpenRouterClient::new(api_key, model)?;
    if let Some(endpoint) = &toml_config.llm.endpoint {
        llm = llm.with_endpoint(endpoint.clone());
    }

    let mut resolver = RootFolderResolver::new(MODULE_NAME).with_cli_arg(args.root_folder);
    if let Some(path) = config_path {
        resolver = resolver.with_config_path(path);
    }
    let root_folder = resolver.resolve();
    let config = PipelineConfig::from_toml(root_folder, &toml_config);
    config.paths.ensure_directories()?;

    let pool = claimguard_server::db::init_database_pool(&config.paths.database).await?;

    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let retriever: Arc<dyn Retriever> = match vector_index::load_index(&config.paths, embedder.as_ref()) {
        Ok(index) => {
            info!(chunks = index.len(), "Retrieval index loaded");
            Arc::new(IndexRetriever::new(Arc::clone(&embedder), index))
        }
        Err(err) => {
            warn!(error = %err, "Retrieval index unavailable; answers will have no document context");
            Arc::new(UnavailableRetriever::new(err.to_string()))
        }
    };

    let analyzer = ClaimAnalyzer::from_config(Arc::clone(&retriever), &config);
    let agent = RagAgent::new(
        ResilientRetriever::new(retriever, config.retrieval.clone()),
        Arc::new(llm),
        args.k,
    );

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"RAG Agent Ready. Ask questions or type: analyze C123456\n")
        .await?;

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            println!("\nBye!");
            break;
        };

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Exit => {
                println!("Bye");
                break;
            }
            Command::Usage(hint) => println!("{}", hint),
            Command::Analyze(claim_id) => {
                println!("\nRunning stage-2 on {}...\n", claim_id);
                match analyzer.analyze_claim(&pool, &claim_id, args.k).await {
                    Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                    Err(err) => println!("Error: {}", err),
                }
            }
            Command::Ask(question) => match agent.answer(&question).await {
                Ok(answer) => {
                    println!("\n--- RAG Answer ---");
                    println!("{}", answer.answer);

                    let ids = extract_claim_ids(&answer.answer);
                    if !ids.is_empty() {
                        println!("\nDetected claim IDs: {:?}", ids);
                    }
                }
                Err(err) => println!("Error: {}", err),
            },
        }
    }

    Ok(())
}
