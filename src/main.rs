//! convdex CLI: ingest conversations and search them

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use convdex::config::Config;
use convdex::pipeline::RagPipeline;
use convdex::types::Metadata;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "convdex")]
#[command(about = "Conversational retrieval engine")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Ingest a conversation (utterances as arguments, or one per line
    /// from a file)
    Ingest {
        /// Utterances, e.g. "Q: when is the launch?" "A: March 3rd"
        messages: Vec<String>,

        /// Read utterances from a file instead, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Metadata as a JSON object, e.g. '{"channel": "support"}'
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Search ingested conversations
    Query {
        /// Query text
        text: String,

        /// Number of results
        #[arg(short, long)]
        top_k: Option<usize>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    config.logging.init();

    match cli.command {
        Commands::Init { path } => init(&path),
        Commands::Ingest {
            messages,
            file,
            metadata,
        } => ingest(config, messages, file, metadata).await,
        Commands::Query {
            text,
            top_k,
            format,
        } => query(config, &text, top_k, &format).await,
    }
}

fn init(path: &PathBuf) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))?;
    let config_path = path.join("config.toml");
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }
    Config::default().save(&config_path)?;
    println!("Wrote {}", config_path.display());
    Ok(())
}

async fn ingest(
    config: Config,
    mut messages: Vec<String>,
    file: Option<PathBuf>,
    metadata: Option<String>,
) -> Result<()> {
    if let Some(path) = file {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        messages.extend(content.lines().map(str::to_string));
    }
    if messages.is_empty() {
        anyhow::bail!("No utterances given. Pass them as arguments or via --file");
    }

    let metadata: Option<Metadata> = match metadata {
        Some(raw) => {
            Some(serde_json::from_str(&raw).context("--metadata must be a JSON object")?)
        }
        None => None,
    };

    let pipeline = RagPipeline::new(config)?;
    let receipt = pipeline.ingest_conversation(&messages, metadata).await?;

    println!("Stored {} ({} dims)", receipt.id, receipt.vector_dim);
    println!("{}", receipt.text);
    Ok(())
}

async fn query(config: Config, text: &str, top_k: Option<usize>, format: &str) -> Result<()> {
    let pipeline = RagPipeline::new(config)?;
    let response = pipeline.similarity_search(text, top_k).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&response)?),
        _ => {
            let matches = response.results.first().map(Vec::as_slice).unwrap_or(&[]);
            if matches.is_empty() {
                println!("No results.");
            }
            for (rank, m) in matches.iter().enumerate() {
                println!("{}. {} (distance {:.4})", rank + 1, m.id, m.distance);
                for line in m.document.lines() {
                    println!("   {line}");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_default_config() {
        let dir = tempfile::TempDir::new().unwrap();
        init(&dir.path().to_path_buf()).unwrap();

        let written = Config::load(&dir.path().join("config.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(written.store.collection, defaults.store.collection);
        assert_eq!(written.embedding.model_id, defaults.embedding.model_id);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        init(&dir.path().to_path_buf()).unwrap();
        assert!(init(&dir.path().to_path_buf()).is_err());
    }
}
