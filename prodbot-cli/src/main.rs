//! `prodbot` answers product questions from scraped review data.
//!
//! ```text
//! prodbot                 # sample question, answer and evaluation scores
//! prodbot --debug         # also print the unfiltered retrieved documents
//! prodbot retrieve        # retrieval and filtering only
//! prodbot ingest          # load the product CSV into the configured store
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prodbot_rag::ingest::DEFAULT_CSV_PATH;
use prodbot_rag::{
    AstraConfig, AstraVectorStore, DataIngestion, EmbeddingDocumentStore, EvaluationScorer,
    InMemoryVectorStore, LlmPrecisionJudge, LlmRelevanceJudge, LlmRelevancyJudge, ModelLoader,
    PromptRegistry, RagConfig, RagPipeline, StoreBackend, VectorStore,
};
use tracing::info;

const SAMPLE_QUESTION: &str = "Can you suggest good budget iPhone under 1,00,000 INR?";
const RETRIEVE_QUESTION: &str = "Can you suggest good budget laptops?";

#[derive(Parser, Debug)]
#[command(name = "prodbot", version, about = "Product assistant over scraped review data")]
struct Args {
    /// Vector store backend (memory or astra). Overrides PRODBOT_STORE.
    #[arg(long)]
    store: Option<StoreBackend>,
    /// Product CSV. Overrides PRODBOT_CSV_PATH.
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Print the retrieved documents before filtering.
    #[arg(long)]
    debug: bool,
    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve and filter documents for a fixed laptop question.
    Retrieve,
    /// Load the product CSV into the configured store.
    Ingest,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if args.json_logs {
        prodbot_telemetry::init_json_telemetry("prodbot");
    } else {
        prodbot_telemetry::init_telemetry("prodbot");
    }

    let config = RagConfig::from_env().context("invalid pipeline configuration")?;
    let loader = ModelLoader::from_env().context("invalid provider configuration")?;
    let backend = match args.store {
        Some(backend) => backend,
        None => std::env::var("PRODBOT_STORE")
            .ok()
            .map(|raw| raw.parse::<StoreBackend>())
            .transpose()?
            .unwrap_or_default(),
    };
    let csv_path = args
        .csv
        .or_else(|| std::env::var_os("PRODBOT_CSV_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH));
    let ingestion = DataIngestion::new(csv_path);

    let store = open_store(&config, &loader, backend).await?;

    match args.command {
        Some(Command::Ingest) => {
            let count = ingestion.run(store.as_ref()).await?;
            println!("Ingested {count} documents into '{}'", store.collection());
            return Ok(());
        }
        _ if backend == StoreBackend::Memory => {
            // The in-memory store starts empty on every run.
            ingestion.run(store.as_ref()).await?;
        }
        _ => {}
    }

    let model = loader.load_generation_model()?;
    let mut builder = RagPipeline::builder()
        .config(config.clone())
        .document_store(store.clone())
        .relevance_judge(Arc::new(LlmRelevanceJudge::new(model.clone())))
        .generation_model(model.clone())
        .prompts(Arc::new(PromptRegistry::default()));

    if args.command.is_none() {
        let scorer = EvaluationScorer::new(
            Arc::new(LlmPrecisionJudge::new(model.clone())),
            Arc::new(LlmRelevancyJudge::new(model)),
            loader.load_embedding_model()?,
        )
        .with_strictness(config.relevancy_strictness)
        .with_call_timeout(config.call_timeout);
        builder = builder.evaluation_scorer(scorer);
    }
    let pipeline = builder.build()?;

    match args.command {
        Some(Command::Retrieve) => retrieve(&pipeline).await,
        _ => answer(&pipeline, args.debug).await,
    }
}

async fn open_store(
    config: &RagConfig,
    loader: &ModelLoader,
    backend: StoreBackend,
) -> Result<Arc<EmbeddingDocumentStore>> {
    let embedder = loader.load_embedding_model()?;
    let (vector_store, name): (Arc<dyn VectorStore>, &str) = match backend {
        StoreBackend::Memory => (Arc::new(InMemoryVectorStore::new()), "memory"),
        StoreBackend::Astra => {
            let astra = AstraConfig::from_env()?;
            (Arc::new(AstraVectorStore::new(astra)?), "astra")
        }
    };
    let store =
        EmbeddingDocumentStore::new(embedder, vector_store, &config.collection, config.top_k)
            .with_backend_name(name);
    store
        .ensure_collection()
        .await
        .with_context(|| format!("cannot prepare collection '{}'", config.collection))?;
    info!(backend = name, collection = %config.collection, "document store ready");
    Ok(Arc::new(store))
}

async fn retrieve(pipeline: &RagPipeline) -> Result<()> {
    let results = pipeline.retrieve(RETRIEVE_QUESTION).await?;
    for (idx, candidate) in results.iter().enumerate() {
        println!("Result {}:", idx + 1);
        println!("Content: {}", candidate.document.content);
        let mut metadata: Vec<_> = candidate.document.metadata.iter().collect();
        metadata.sort();
        println!("Metadata: {metadata:?}");
        println!();
    }
    if results.is_empty() {
        println!("No documents passed retrieval and filtering.");
    }
    Ok(())
}

async fn answer(pipeline: &RagPipeline, debug: bool) -> Result<()> {
    let answer = pipeline.answer(SAMPLE_QUESTION, debug).await?;

    if let Some(trace) = &answer.debug_trace {
        println!("\nRetrieved Documents:\n{trace}\n\n---\n");
    }
    println!("{}", answer.text);

    let scores = pipeline.evaluate(SAMPLE_QUESTION, &answer.text, &answer.contexts).await;
    println!("\n--- Evaluation Metrics ---");
    println!("Context Precision Score: {}", display_score(scores.context_precision));
    println!("Response Relevancy Score: {}", display_score(scores.response_relevancy));
    Ok(())
}

fn display_score(score: Option<f64>) -> String {
    score.map_or_else(|| "undefined".to_string(), |s| format!("{s:.4}"))
}
