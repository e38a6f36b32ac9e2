//! ragcore command line: offline index pipeline and serving process.
//!
//! The offline steps form a strict pipeline — each consumes the previous
//! step's output file:
//!
//! ```text
//! ragcore chunk        documents/        → chunks.json
//! ragcore embed        chunks.json       → vectors.bin
//! ragcore build-index  vectors.bin       → index.hnsw
//! ragcore serve        index.hnsw + chunks.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ragcore::chunker::{chunk_documents, Document};
use ragcore::config::RetrieverConfig;
use ragcore::embedder::{Embedder, HttpEmbedder};
use ragcore::index::VectorIndex;
use ragcore::reranker::{HttpReranker, LexicalReranker, Reranker};
use ragcore::retriever::RetrieverContext;
use ragcore::store::{load_vectors, save_vectors, ChunkStore};

const EMBED_BATCH_SIZE: usize = 32;

#[derive(Parser)]
#[command(name = "ragcore", version, about = "Retrieval-augmented search backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a directory of JSON documents into a chunk file.
    Chunk {
        /// Directory containing `*.json` documents ({id, text, meta:{title}}).
        #[arg(long)]
        documents: PathBuf,
        /// Output chunk file.
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 256)]
        chunk_size: usize,
        #[arg(long, default_value_t = 20)]
        overlap: usize,
    },
    /// Embed every chunk (passage side, no query prefix) into a vector file.
    Embed {
        /// Chunk file produced by `chunk`.
        #[arg(long)]
        chunks: PathBuf,
        /// Output vector array file.
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        backend: EmbedBackendArgs,
    },
    /// Build the persisted HNSW index from a vector file.
    BuildIndex {
        /// Vector file produced by `embed`.
        #[arg(long)]
        vectors: PathBuf,
        /// Output index file (published atomically).
        #[arg(long)]
        output: PathBuf,
        /// Optional TOML config overriding the HNSW parameters.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Serve the retrieve and embed endpoints over a built index.
    Serve {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        chunks: PathBuf,
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
        /// Optional TOML config for retrieval tunables.
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        backend: EmbedBackendArgs,
        /// Rerank endpoint; without it the lexical fallback scorer is used.
        #[arg(long)]
        rerank_endpoint: Option<String>,
        #[arg(long, default_value = "rerank-default")]
        rerank_model: String,
    },
}

#[derive(Args)]
struct EmbedBackendArgs {
    /// OpenAI-compatible embeddings endpoint.
    #[arg(long)]
    embed_endpoint: String,
    #[arg(long, default_value = "mxbai-embed-large-v1")]
    embed_model: String,
    #[arg(long, default_value_t = 1024)]
    dimension: usize,
    /// Environment variable holding the backend API key, if any.
    #[arg(long)]
    api_key_env: Option<String>,
}

impl EmbedBackendArgs {
    fn build(&self) -> anyhow::Result<HttpEmbedder> {
        let mut embedder =
            HttpEmbedder::new(&self.embed_endpoint, &self.embed_model, self.dimension);
        if let Some(var) = &self.api_key_env {
            let key = std::env::var(var)
                .with_context(|| format!("api key environment variable {var} is not set"))?;
            embedder = embedder.with_api_key(key);
        }
        Ok(embedder)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match Cli::parse().command {
        Command::Chunk { documents, output, chunk_size, overlap } => {
            run_chunk(&documents, &output, chunk_size, overlap)
        }
        Command::Embed { chunks, output, backend } => {
            run_embed(&chunks, &output, &backend.build()?).await
        }
        Command::BuildIndex { vectors, output, config } => {
            run_build_index(&vectors, &output, config.as_deref())
        }
        Command::Serve { index, chunks, addr, config, backend, rerank_endpoint, rerank_model } => {
            let embedder = backend.build()?;
            let dimension = backend.dimension;
            let reranker: Arc<dyn Reranker> = match rerank_endpoint {
                Some(endpoint) => Arc::new(HttpReranker::new(endpoint, rerank_model)),
                None => Arc::new(LexicalReranker),
            };
            run_serve(&index, &chunks, &addr, config.as_deref(), dimension, embedder, reranker)
                .await
        }
    }
}

fn run_chunk(documents: &Path, output: &Path, chunk_size: usize, overlap: usize) -> anyhow::Result<()> {
    if !documents.is_dir() {
        bail!("{} is not a directory", documents.display());
    }

    let mut docs: Vec<Document> = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(documents)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    for path in entries {
        let bytes = fs::read(&path)?;
        match serde_json::from_slice::<Document>(&bytes) {
            Ok(doc) => docs.push(doc),
            Err(e) => warn!(path = %path.display(), %e, "skipping undecodable document"),
        }
    }
    if docs.is_empty() {
        bail!("read 0 documents from {}", documents.display());
    }
    info!(count = docs.len(), "documents read");

    let chunks = chunk_documents(&docs, chunk_size, overlap)?;
    let titles: Vec<&str> = docs.iter().map(|d| d.meta.title.as_str()).collect();
    info!(
        documents = docs.len(),
        chunks = chunks.len(),
        titles = titles.join(", "),
        "chunking complete"
    );

    ChunkStore::new(chunks).save(output)?;
    Ok(())
}

async fn run_embed(chunks: &Path, output: &Path, embedder: &dyn Embedder) -> anyhow::Result<()> {
    let store = ChunkStore::load(chunks)
        .with_context(|| format!("chunk file {} missing; run `ragcore chunk` first", chunks.display()))?;
    if store.is_empty() {
        bail!("chunk file {} holds no chunks", chunks.display());
    }

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(store.len());
    for (i, batch) in store.chunks().chunks(EMBED_BATCH_SIZE).enumerate() {
        let texts: Vec<&str> = batch.iter().map(|c| c.chunk_text.as_str()).collect();
        let embedded = embedder.embed_batch(&texts).await?;
        vectors.extend(embedded);
        info!(batch = i, embedded = vectors.len(), total = store.len(), "embedding progress");
    }

    save_vectors(output, &vectors)?;
    Ok(())
}

fn run_build_index(vectors: &Path, output: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => RetrieverConfig::from_path(path)?,
        None => RetrieverConfig::default(),
    };
    let (dimension, rows) = load_vectors(vectors).with_context(|| {
        format!("vector file {} missing; run `ragcore embed` first", vectors.display())
    })?;

    let index = VectorIndex::build(dimension, rows, config.hnsw_params())?;
    index.save(output)?;
    info!(path = %output.display(), count = index.len(), "index published");
    Ok(())
}

async fn run_serve(
    index: &Path,
    chunks: &Path,
    addr: &str,
    config: Option<&Path>,
    dimension: usize,
    embedder: HttpEmbedder,
    reranker: Arc<dyn Reranker>,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => RetrieverConfig::from_path(path)?,
        None => RetrieverConfig::default(),
    }
    .with_dimension(dimension);

    let index = VectorIndex::restore(index)
        .with_context(|| format!("index {} missing; run `ragcore build-index` first", index.display()))?;
    let store = ChunkStore::load(chunks)?;

    let ctx = Arc::new(RetrieverContext::new(
        index,
        store,
        Arc::new(embedder),
        reranker,
        config,
    )?);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving");
    axum::serve(listener, ragcore::server::router(ctx)).await?;
    Ok(())
}
