use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mark_chunker::{ChunkerConfig, CorpusPreparer, ParagraphChunker, TextExtractor};
use mark_indexer::{BuildConfig, BuildProgress, CorpusIndexer};
use mark_protocol::{response_schema, serialize_json};
use mark_search::{RetrievalConfig, RetrievalService};
use mark_vector_store::{DataLayout, EmbeddingConfig, EmbeddingModel};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::flags::{EmbedFailureFlag, EmbedMode};

mod doctor;
mod flags;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "mark")]
#[command(about = "Filing retrieval maintenance and diagnostics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root holding the `data/` directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Retrieval config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override embedding backend (MARK_EMBEDDING_MODE)
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Override embedding model id (EMBEDDING_MODEL)
    #[arg(long, global = true)]
    embed_model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert raw filing HTML into cleaned text
    Extract,

    /// Split cleaned filing text into chunk files
    Chunk(ChunkArgs),

    /// Embed chunk files into the vector index
    Index(IndexArgs),

    /// Retrieve context passages for a question
    Context(ContextArgs),

    /// Check the persisted index for consistency
    Doctor(DoctorArgs),

    /// Print the JSON schema of the context response
    Schema,
}

#[derive(Args)]
struct ChunkArgs {
    /// Maximum characters per chunk
    #[arg(long)]
    max_chars: Option<usize>,
}

#[derive(Args)]
struct IndexArgs {
    /// Rebuild from an empty index instead of appending new chunks
    #[arg(long)]
    full: bool,

    /// Chunks per embedding request (overrides BATCH_SIZE)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Checkpoint after this many new entries (overrides SAVE_EVERY)
    #[arg(long)]
    save_every: Option<usize>,

    /// What to do when a batch cannot be embedded
    #[arg(long, value_enum, default_value = "abort")]
    on_embed_failure: EmbedFailureFlag,
}

#[derive(Args)]
struct ContextArgs {
    /// Question text
    query: String,

    /// Restrict results to these tickers (repeatable)
    #[arg(long = "ticker", short = 't')]
    tickers: Vec<String>,

    /// Maximum number of candidates
    #[arg(long)]
    total_k: Option<usize>,

    /// Maximum candidates per ticker
    #[arg(long)]
    per_entity_k: Option<usize>,

    /// Give up with an empty response after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Include visited pipeline stages in the output
    #[arg(long)]
    trace: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct DoctorArgs {
    /// Output JSON instead of a human summary
    #[arg(long)]
    json: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    if !cli.verbose {
        builder.filter_module("reqwest", log::LevelFilter::Warn);
        builder.filter_module("tokenizers", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    let layout = DataLayout::for_project_root(&cli.root);

    match &cli.command {
        Commands::Extract => run_extract(&layout).await?,
        Commands::Chunk(args) => run_chunk(&layout, args).await?,
        Commands::Index(args) => run_index(&cli, &layout, args).await?,
        Commands::Context(args) => run_context(&cli, &layout, args).await?,
        Commands::Doctor(args) => run_doctor(&cli, &layout, args).await?,
        Commands::Schema => print_stdout(&response_schema()?)?,
    }

    Ok(())
}

fn embedding_config(cli: &Cli) -> Result<EmbeddingConfig> {
    let mut config = EmbeddingConfig::from_env()?;
    if let Some(mode) = cli.embed_mode {
        config = config.with_mode(mode.as_domain());
    }
    if let Some(model) = &cli.embed_model {
        config = config.with_model(model.clone());
    }
    Ok(config)
}

fn retrieval_config(cli: &Cli) -> Result<RetrievalConfig> {
    match &cli.config {
        Some(path) => RetrievalConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RetrievalConfig::default()),
    }
}

async fn run_extract(layout: &DataLayout) -> Result<()> {
    let extractor = TextExtractor::new(layout.documents_raw_dir(), layout.text_clean_dir());
    let stats = extractor.extract().await.with_context(|| {
        format!("Extracting {} failed", layout.documents_raw_dir().display())
    })?;
    log::info!(
        "Extracted {} filings ({} already extracted, {} unreadable)",
        stats.documents,
        stats.skipped_existing,
        stats.unreadable
    );
    print_stdout(&serialize_json(&stats)?)
}

async fn run_chunk(layout: &DataLayout, args: &ChunkArgs) -> Result<()> {
    let config = args
        .max_chars
        .map_or_else(ChunkerConfig::default, ChunkerConfig::with_max_chars);
    let chunker = ParagraphChunker::new(config)?;
    let preparer = CorpusPreparer::new(layout.text_clean_dir(), layout.chunks_dir(), chunker);

    let stats = preparer
        .prepare()
        .await
        .with_context(|| format!("Chunking {} failed", layout.text_clean_dir().display()))?;
    log::info!(
        "Chunked {} documents into {} chunks ({} already chunked)",
        stats.documents,
        stats.chunks,
        stats.skipped_existing
    );
    print_stdout(&serialize_json(&stats)?)
}

async fn run_index(cli: &Cli, layout: &DataLayout, args: &IndexArgs) -> Result<()> {
    let embedder = Arc::new(EmbeddingModel::new(embedding_config(cli)?)?);

    let mut config = BuildConfig::from_env()?;
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(save_every) = args.save_every {
        config.save_every = save_every;
    }
    config.on_embed_failure = args.on_embed_failure.as_domain();

    let bar = progress_bar(cli.quiet);
    let callback_bar = bar.clone();
    let indexer = CorpusIndexer::new(layout.clone(), embedder, config)?.with_progress(Arc::new(
        move |progress: BuildProgress| {
            callback_bar.set_length(progress.total as u64);
            callback_bar.set_position(progress.processed as u64);
        },
    ));

    let result = if args.full {
        indexer.rebuild().await
    } else {
        indexer.index().await
    };
    bar.finish_and_clear();
    let stats = result.context("Index build failed")?;

    print_stdout(&serialize_json(&stats)?)
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks")
    {
        bar.set_style(style);
    }
    bar
}

async fn run_context(cli: &Cli, layout: &DataLayout, args: &ContextArgs) -> Result<()> {
    let config = retrieval_config(cli)?;
    let embedder = Arc::new(EmbeddingModel::new(embedding_config(cli)?)?);
    let service = RetrievalService::open(layout, embedder, &config)
        .await
        .context("Failed to open the index (run `mark index` first)")?
        .with_trace(args.trace);

    let mut request = service.request_for(args.tickers.iter().cloned());
    if let Some(total_k) = args.total_k {
        request.total_k = total_k;
    }
    if let Some(per_entity_k) = args.per_entity_k {
        request.per_entity_k = per_entity_k;
    }

    let response = match args.timeout_ms {
        Some(ms) => {
            service
                .answer_within(&args.query, &request, Duration::from_millis(ms))
                .await
        }
        None => service.answer(&args.query, &request).await,
    };

    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serialize_json(&response)?
    };
    print_stdout(&output)
}

async fn run_doctor(cli: &Cli, layout: &DataLayout, args: &DoctorArgs) -> Result<()> {
    let report = doctor::diagnose(layout, &embedding_config(cli)?).await;

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&report)?)?;
    } else {
        eprintln!("Data root: {}", report.root);
        eprintln!(
            "Embedding mode/model: {} / {}",
            report.embedding_mode, report.embedding_model
        );
        match (report.vectors, report.metadata_rows) {
            (Some(vectors), Some(rows)) => eprintln!("Index: {vectors} vectors, {rows} metadata rows"),
            _ => eprintln!("Index: not loadable"),
        }
        if let Some(dim) = report.index_dimension {
            eprintln!("Dimension: {dim}");
        }
        eprintln!("Chunk files: {}", report.chunk_files);
        for missing in &report.missing_chunk_files {
            eprintln!("  - missing chunk: {missing}");
        }
        if report.ok() {
            eprintln!("Status: ok");
        } else {
            for issue in &report.issues {
                eprintln!("  - {issue}");
            }
        }
    }

    if !report.ok() {
        std::process::exit(1);
    }

    Ok(())
}
