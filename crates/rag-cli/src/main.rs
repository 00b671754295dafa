//! RAG CLI - Command-line interface for the hybrid RAG engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rag_core::{
    Answer, CancelToken, Degradation, DocId, Embedder, Generator, QueryParams, RagConfig,
    Retrieval,
};
use rag_embed::{HashingEmbedder, OllamaEmbedder};
use rag_index::CorpusIndex;
use rag_llm::{ExtractiveGenerator, OllamaGenerator};
use rag_query::{Explanation, RagEngine};
use rag_text::{load_knowledge_base, KnowledgeBaseStats, QaPair};

type Engine = RagEngine<dyn Embedder, dyn Generator>;
type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// RAG - Hybrid retrieval-augmented answers over a Q&A knowledge base
#[derive(Parser)]
#[command(name = "rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/rag/config.toml, then ./rag.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the built-in hashing embedder and extractive generator instead of Ollama
    #[arg(long, global = true)]
    offline: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the knowledge base
    Search {
        /// Knowledge base file
        kb: PathBuf,

        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Keyword weight in [0, 1]; the rest goes to semantic similarity
        #[arg(short, long)]
        alpha: Option<f32>,
    },

    /// Answer a question from the knowledge base
    Ask {
        /// Knowledge base file
        kb: PathBuf,

        /// Question
        question: String,

        /// Number of passages retrieved
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Context budget (in the configured unit)
        #[arg(short, long)]
        budget: Option<usize>,
    },

    /// Explain how a query is ranked
    Explain {
        /// Knowledge base file
        kb: PathBuf,

        /// Query to explain
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Keyword weight in [0, 1]
        #[arg(short, long)]
        alpha: Option<f32>,

        /// Also explain the match against this document
        #[arg(short, long)]
        doc: Option<u64>,
    },

    /// Show knowledge base and index statistics
    Stats {
        /// Knowledge base file
        kb: PathBuf,
    },
}

impl Commands {
    fn kb(&self) -> &Path {
        match self {
            Commands::Search { kb, .. }
            | Commands::Ask { kb, .. }
            | Commands::Explain { kb, .. }
            | Commands::Stats { kb } => kb.as_path(),
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(path: Option<&Path>) -> CliResult<RagConfig> {
    let config = match path {
        Some(path) => RagConfig::load(path)?,
        None => RagConfig::load_default()?,
    };
    Ok(config)
}

async fn providers(
    config: &RagConfig,
    offline: bool,
) -> CliResult<(Arc<dyn Embedder>, Arc<dyn Generator>)> {
    if offline {
        info!("Using offline providers");
        return Ok((
            Arc::new(HashingEmbedder::default()),
            Arc::new(ExtractiveGenerator::new()),
        ));
    }

    let embedder = OllamaEmbedder::new(&config.ollama)?;
    let generator = OllamaGenerator::new(&config.ollama)?;

    if let Err(e) = embedder.health_check().await {
        eprintln!(
            "Embedding model '{}' is not available at {}: {}",
            config.ollama.embedding_model, config.ollama.base_url, e
        );
        eprintln!(
            "Pull it with 'ollama pull {}' or run with --offline.",
            config.ollama.embedding_model
        );
        return Err(e.into());
    }
    if let Err(e) = generator.health_check().await {
        eprintln!(
            "Generation model '{}' is not available at {}: {}",
            config.ollama.generation_model, config.ollama.base_url, e
        );
        eprintln!(
            "Pull it with 'ollama pull {}' or run with --offline.",
            config.ollama.generation_model
        );
        return Err(e.into());
    }

    Ok((Arc::new(embedder), Arc::new(generator)))
}

async fn build_engine(
    config: RagConfig,
    pairs: &[QaPair],
    offline: bool,
) -> CliResult<Engine> {
    let (embedder, generator) = providers(&config, offline).await?;

    let corpus = Arc::new(CorpusIndex::new(
        embedder,
        config.sparse.clone(),
        config.embedding.clone(),
    ));
    let stats = corpus
        .rebuild(pairs.iter().map(QaPair::to_source_document).collect())
        .await?;
    info!(
        "Indexed {} documents ({} terms)",
        stats.documents, stats.vocabulary
    );

    let engine = RagEngine::new(corpus, generator, config);
    if offline {
        Ok(engine)
    } else {
        Ok(engine.with_fallback(Arc::new(ExtractiveGenerator::new())))
    }
}

/// Cancel `token` when the user presses Ctrl-C.
fn cancel_on_interrupt(token: &CancelToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling query");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let pairs = load_knowledge_base(cli.command.kb())?;
    let engine = build_engine(config, &pairs, cli.offline).await?;

    let cancel = CancelToken::new();
    cancel_on_interrupt(&cancel);

    match cli.command {
        Commands::Search {
            query,
            top_k,
            alpha,
            ..
        } => {
            let params = QueryParams {
                top_k,
                alpha,
                budget: None,
            };
            let retrieval = engine.retrieve(&query, params, &cancel).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&retrieval)?);
            } else {
                print_retrieval(&engine, &retrieval);
            }
        }
        Commands::Ask {
            question,
            top_k,
            budget,
            ..
        } => {
            let params = QueryParams {
                top_k,
                alpha: None,
                budget,
            };
            let answer = engine.answer(&question, params, &cancel).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Commands::Explain {
            query,
            top_k,
            alpha,
            doc,
            ..
        } => {
            let params = QueryParams {
                top_k,
                alpha,
                budget: None,
            };
            let explanation = engine
                .explain(&query, params, doc.map(DocId), &cancel)
                .await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&explanation)?);
            } else {
                print_explanation(&explanation);
            }
        }
        Commands::Stats { .. } => {
            let kb = KnowledgeBaseStats::from_pairs(&pairs);
            let index = engine.corpus().stats()?;
            if cli.json {
                let value = serde_json::json!({
                    "knowledge_base": {
                        "total_pairs": kb.total_pairs,
                        "total_characters": kb.total_characters,
                        "average_question_length": kb.average_question_length,
                        "average_answer_length": kb.average_answer_length,
                    },
                    "index": index,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Knowledge base:");
                println!("  Q&A pairs:           {}", kb.total_pairs);
                println!("  Total characters:    {}", kb.total_characters);
                println!("  Avg question length: {}", kb.average_question_length);
                println!("  Avg answer length:   {}", kb.average_answer_length);
                println!("Index:");
                println!("  Snapshot version:    {}", index.version);
                println!("  Documents:           {}", index.documents);
                println!("  Vocabulary:          {}", index.vocabulary);
                match index.dimension {
                    Some(dimension) => println!("  Embedding dimension: {}", dimension),
                    None => println!("  Embedding dimension: -"),
                }
            }
        }
    }

    Ok(())
}

fn print_degradation(degradation: Option<&Degradation>) {
    if let Some(degradation) = degradation {
        println!("Note: semantic search was skipped ({:?})\n", degradation);
    }
}

fn print_retrieval(engine: &Engine, retrieval: &Retrieval) {
    print_degradation(retrieval.degradation.as_ref());

    if retrieval.candidates.is_empty() {
        println!("No results found.");
        return;
    }

    let snapshot = engine.corpus().snapshot().ok();
    for (rank, candidate) in retrieval.candidates.iter().enumerate() {
        println!(
            "{}. [{}] {:.3} - {}",
            rank + 1,
            candidate.doc_id,
            candidate.fused_score,
            candidate.explanation()
        );
        let question = snapshot
            .as_ref()
            .and_then(|s| s.document(candidate.doc_id))
            .and_then(|d| d.metadata.get("question"))
            .and_then(|q| q.as_str());
        if let Some(question) = question {
            println!("   {}", question);
        }
    }
}

fn print_answer(answer: &Answer) {
    print_degradation(answer.degradation.as_ref());
    if answer.fallback {
        println!("Note: the language model is unavailable, showing the best passage\n");
    }
    println!("{}", answer.text);

    if answer.low_confidence {
        println!("\n(no supporting passages found)");
    } else {
        let evidence: Vec<String> = answer.evidence.iter().map(ToString::to_string).collect();
        println!("\nSources: {}", evidence.join(", "));
    }
    println!(
        "Snapshot v{}, {}ms",
        answer.snapshot_version, answer.latency_ms
    );
}

fn print_explanation(explanation: &Explanation) {
    println!("Query: {}", explanation.query);
    println!("Results: {}", explanation.total_results);
    println!("  keyword only:  {}", explanation.keyword_only);
    println!("  semantic only: {}", explanation.semantic_only);
    println!("  both:          {}", explanation.both);
    println!("Keyword weight: {:.2}", explanation.alpha);
    print_degradation(explanation.degradation.as_ref());

    if let Some(top) = &explanation.top_result {
        println!("Top result: {} ({})", top.doc_id, top.explanation());
    }

    if !explanation.important_terms.is_empty() {
        println!("Important query terms:");
        for (term, weight) in &explanation.important_terms {
            println!("  {:<20} {:.3}", term, weight);
        }
    }

    if let Some(document) = &explanation.document {
        println!("Document {}:", document.doc_id);
        println!("  matching terms: {}", document.matching_terms.join(", "));
        let top_terms: Vec<&str> = document
            .document_terms
            .iter()
            .map(|(term, _)| term.as_str())
            .collect();
        println!("  top terms:      {}", top_terms.join(", "));
    }
}
