//! Thin demonstration front end over the `amem` facade.

use std::sync::Arc;

use amem::{ChatMessage, MemoryCore};
use amem_core::MemoryConfig;
use amem_llm::{HttpEmbedder, HttpExtractionLlm, HttpRetrievalLlm};
use amem_vector::{PineconeBackend, UpstashBackend, VectorBackend};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

mod logging;

use logging::init_cli_logging;

#[derive(Parser)]
#[command(name = "amem-cli")]
#[command(about = "Demonstration CLI for the agent memory subsystem")]
struct Cli {
  /// Subject key identifying whose memories this session operates on
  #[arg(long, global = true, default_value = "default-user")]
  subject: String,
  /// Scope (project, workspace, etc.) memories are partitioned under
  #[arg(long, global = true, default_value = "default-scope")]
  scope: String,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Retrieve formatted context for a prompt
  GetContext {
    /// The prompt to build retrieval context for
    prompt: String,
  },
  /// Feed a (user, assistant) exchange through background ingestion
  UpdateHistory {
    /// What the user said
    user: String,
    /// What the assistant replied
    assistant: String,
  },
  /// Print current cache hit/miss counters
  CacheStats,
  /// Switch the active vector backend by tag
  SwitchBackend {
    /// Backend tag to switch to ("upstash" or "pinecone")
    tag: String,
  },
}

fn build_backend(tag: &str) -> Result<Arc<dyn VectorBackend>> {
  match tag {
    "upstash" => {
      let backend = UpstashBackend::from_env().context("UPSTASH_VECTOR_REST_URL/TOKEN not set")?;
      Ok(Arc::new(backend))
    }
    "pinecone" => {
      let backend = PineconeBackend::from_env().context("PINECONE_HOST/PINECONE_API_KEY not set")?;
      Ok(Arc::new(backend))
    }
    other => bail!("unknown backend tag: {other}"),
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  init_cli_logging();

  let cli = Cli::parse();

  let embedder = Arc::new(HttpEmbedder::from_env().context("OPENROUTER_API_KEY not set")?);
  let upstash = build_backend("upstash");
  let pinecone = build_backend("pinecone");
  let (initial_backend, other_backend) = match (upstash, pinecone) {
    (Ok(u), p) => (u, p.ok()),
    (Err(_), Ok(p)) => (p, None),
    (Err(e), Err(_)) => return Err(e).context("no vector backend credentials found in the environment"),
  };

  let project_path = std::env::current_dir().context("reading current directory")?;
  let config = MemoryConfig::load_for_project(&project_path);

  let mut core = MemoryCore::new(initial_backend, embedder, cli.subject, cli.scope, &config);
  if let Some(extraction_llm) = HttpExtractionLlm::from_env() {
    core = core.with_extraction_llm(Arc::new(extraction_llm));
  }
  if let Some(retrieval_llm) = HttpRetrievalLlm::from_env() {
    core = core.with_retrieval_llm(Arc::new(retrieval_llm));
  }
  if let Some(other_backend) = other_backend {
    core.register_backend(other_backend).await;
  }

  match cli.command {
    Commands::GetContext { prompt } => {
      let context = core.get_context(&prompt).await?;
      println!("{context}");
    }
    Commands::UpdateHistory { user, assistant } => {
      core.update_history(vec![ChatMessage::user(user), ChatMessage::assistant(assistant)]).await;
      println!("ingestion scheduled in the background");
    }
    Commands::CacheStats => {
      let stats = core.cache_stats().await;
      println!("hits={} misses={}", stats.hits, stats.misses);
    }
    Commands::SwitchBackend { tag } => {
      core.switch_backend(&tag).await?;
      println!("switched to {tag}");
    }
  }

  core.close().await;
  Ok(())
}
