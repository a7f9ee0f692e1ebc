//! RAG CLI - Ask questions against a local corpus.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use rag_core::{LlmProvider, RagConfig};
use rag_query::{RagUtilities, ResponseOptions};
use rag_retrieve::{Corpus, HybridRetriever};

/// RAG - Retrieve, rerank, filter and answer over a corpus
#[derive(Parser)]
#[command(name = "rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/rag-utilities/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the corpus
    Ask {
        /// Question to answer
        prompt: String,

        /// JSON or JSONL file of nodes
        #[arg(long)]
        corpus: PathBuf,

        /// Keep nodes below the similarity cutoff
        #[arg(long)]
        no_filter: bool,

        /// Print the answer only once it is complete
        #[arg(long)]
        no_stream: bool,

        /// Similarity cutoff for filtering
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Use the offline mock model
        #[arg(long)]
        mock: bool,
    },

    /// Show the nodes retrieved for a prompt
    Retrieve {
        /// Query text
        prompt: String,

        /// JSON or JSONL file of nodes
        #[arg(long)]
        corpus: PathBuf,

        /// Drop nodes below the similarity cutoff
        #[arg(short, long)]
        filter: bool,

        /// Similarity cutoff for filtering
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Print the effective configuration
    Config,
}

fn load_config(path: Option<&Path>) -> rag_core::Result<RagConfig> {
    match path {
        Some(path) => RagConfig::load(path),
        None => RagConfig::load_default(),
    }
}

/// Override the similarity cutoff, then validate the resulting config.
fn apply_threshold(config: &mut RagConfig, threshold: Option<f32>) -> rag_core::Result<()> {
    if let Some(threshold) = threshold {
        config.filter.similarity_cutoff = threshold;
    }
    config.validate()
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask {
            prompt,
            corpus,
            no_filter,
            no_stream,
            threshold,
            mock,
        } => {
            if mock {
                config.llm.provider = LlmProvider::Mock;
            }
            apply_threshold(&mut config, threshold)?;

            let utils = build_utilities(&config, &corpus).await?;
            let options = ResponseOptions {
                filtering: !no_filter && utils.default_options().filtering,
                streaming: !no_stream && utils.default_options().streaming,
            };

            let mut out = io::stdout().lock();
            utils.generate_response(&prompt, options, &mut out).await?;
            out.flush()?;
        }
        Commands::Retrieve {
            prompt,
            corpus,
            filter,
            threshold,
        } => {
            config.display.echo_nodes = false;
            apply_threshold(&mut config, threshold)?;
            let utils = build_utilities(&config, &corpus).await?;

            let mut out = io::stdout().lock();
            let mut nodes = utils.retrieve_and_rerank(&prompt, &mut out).await?;
            if filter || threshold.is_some() {
                nodes = utils.filter_nodes(nodes, None, &mut out)?;
            }

            if nodes.is_empty() {
                writeln!(out, "No nodes found.")?;
            } else {
                utils.display_nodes(&nodes, &mut out)?;
            }
            out.flush()?;
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

async fn build_utilities(
    config: &RagConfig,
    corpus_path: &Path,
) -> rag_core::Result<RagUtilities> {
    let corpus = Corpus::load(corpus_path)?;

    let embedder = rag_embed::from_config(&config.embedding)?;
    let retriever =
        HybridRetriever::from_config(&config.retrieval, &corpus, embedder.clone()).await?;
    let reranker = rag_postprocess::reranker_from_config(&config.rerank, embedder);
    let llm = rag_llm::from_config(&config.llm)?;

    RagUtilities::new(Arc::new(retriever), reranker, llm, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_threshold_overrides_cutoff() {
        let mut config = RagConfig::default();
        apply_threshold(&mut config, Some(0.8)).unwrap();
        assert!((config.filter.similarity_cutoff - 0.8).abs() < 1e-6);

        apply_threshold(&mut config, None).unwrap();
        assert!((config.filter.similarity_cutoff - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_apply_threshold_rejects_nan() {
        let mut config = RagConfig::default();
        let err = apply_threshold(&mut config, Some(f32::NAN)).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_retrieve_accepts_threshold_flag() {
        let cli = Cli::try_parse_from([
            "rag", "retrieve", "rust", "--corpus", "nodes.jsonl", "--threshold", "0.7",
        ])
        .unwrap();
        match cli.command {
            Commands::Retrieve { threshold, filter, .. } => {
                assert_eq!(threshold, Some(0.7));
                assert!(!filter);
            }
            _ => panic!("expected retrieve"),
        }
    }
}
