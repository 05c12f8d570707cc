use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use ragdb_core::config::{Config, RetrievalSettings};
use ragdb_core::traits::{Embedder, IndexStore};
use ragdb_core::types::SearchMode;
use ragdb_embed::get_default_embedder;
use ragdb_hybrid::ingest::ALLOWED_EXTENSIONS;
use ragdb_hybrid::{CancellationToken, Ingestor, QueryEngine, QueryPurpose, QueryRequest, QueryResponse, UploadFile};
use ragdb_vector::LocalIndexStore;

#[derive(Parser, Debug)]
#[command(name = "ragdb", version, about = "Hybrid vector + keyword retrieval over local document indexes")]
struct Cli {
    /// Storage directory (overrides `storage.dir` from the config)
    #[arg(short, long, global = true, value_name = "DIR")]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, delete and inspect indexes
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Upload files or directories into an index
    Upload {
        index: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Query one or more indexes
    Query {
        query: String,

        /// Index to search; repeat for several
        #[arg(short, long = "index", required = true)]
        indexes: Vec<String>,

        #[arg(short)]
        k: Option<i64>,

        #[arg(short, long, value_enum, default_value_t = ModeArg::Hybrid)]
        mode: ModeArg,

        /// Relevance floor; defaults to the configured one for the purpose
        #[arg(long)]
        min_score: Option<f32>,

        /// Use the chat relevance floor
        #[arg(long)]
        chat: bool,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// List or delete documents of an index
    Documents {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// Report service health
    Health,
}

#[derive(Subcommand, Debug)]
enum IndexAction {
    Create { name: String },
    Delete { name: String },
    List,
    Info { name: String },
}

#[derive(Subcommand, Debug)]
enum DocumentAction {
    List { index: String },
    Delete { index: String, document_id: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Vector,
    Keyword,
    Hybrid,
}

impl From<ModeArg> for SearchMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Vector => SearchMode::Vector,
            ModeArg::Keyword => SearchMode::Keyword,
            ModeArg::Hybrid => SearchMode::Hybrid,
        }
    }
}

struct App {
    store: Arc<LocalIndexStore>,
    embedder: Arc<dyn Embedder>,
    settings: RetrievalSettings,
}

impl App {
    fn open(config: &Config, storage: Option<PathBuf>) -> anyhow::Result<Self> {
        let dir = match storage {
            Some(dir) => dir,
            None => config.storage()?.resolved_dir(),
        };
        let store = Arc::new(LocalIndexStore::open(&dir)?);
        let embedder = get_default_embedder(&config.embedding()?)?;
        Ok(Self { store, embedder, settings: config.retrieval()? })
    }

    fn engine(&self) -> QueryEngine {
        QueryEngine::new(self.store.clone(), Arc::clone(&self.embedder), self.settings.clone())
    }

    fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.store.clone(), Arc::clone(&self.embedder), &self.settings)
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let app = App::open(&config, cli.storage)?;

    match cli.command {
        Commands::Index { action } => cmd_index(&app, action)?,
        Commands::Upload { index, paths } => cmd_upload(&app, &index, &paths)?,
        Commands::Query { query, indexes, k, mode, min_score, chat, json } => {
            let mut request = QueryRequest::new(indexes, query).with_mode(mode.into());
            request.k = k;
            request.min_score = min_score;
            if chat {
                request = request.with_purpose(QueryPurpose::Chat);
            }
            cmd_query(&app, &request, json).await?;
        }
        Commands::Documents { action } => cmd_documents(&app, action)?,
        Commands::Health => print_json(&app.engine().health()?)?,
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_index(app: &App, action: IndexAction) -> anyhow::Result<()> {
    match action {
        IndexAction::Create { name } => print_json(&app.store.create_index(&name)?),
        IndexAction::Delete { name } => {
            app.store.delete_index(&name)?;
            println!("Deleted index {name}");
            Ok(())
        }
        IndexAction::List => print_json(&app.store.list_indexes()?),
        IndexAction::Info { name } => print_json(&app.store.get_index(&name)?),
    }
}

fn cmd_documents(app: &App, action: DocumentAction) -> anyhow::Result<()> {
    match action {
        DocumentAction::List { index } => print_json(&app.store.list_documents(&index)?),
        DocumentAction::Delete { index, document_id } => print_json(&app.store.delete_document(&index, &document_id)?),
    }
}

/// Files named directly are always attempted; directories contribute only
/// files with a supported extension.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && has_allowed_extension(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn cmd_upload(app: &App, index: &str, paths: &[PathBuf]) -> anyhow::Result<()> {
    let files = collect_files(paths);
    if files.is_empty() {
        anyhow::bail!("no files to upload");
    }

    let mut uploads = Vec::with_capacity(files.len());
    let mut unreadable = Vec::new();
    for path in &files {
        match UploadFile::from_path(path) {
            Ok(f) => uploads.push(f),
            Err(e) => unreadable.push(format!("{}: {}", path.display(), e)),
        }
    }

    let pb = ProgressBar::new(uploads.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let report = app.ingestor().upload_with(index, uploads, |name, _| {
        pb.set_message(name.to_string());
        pb.inc(1);
    })?;
    pb.finish_and_clear();

    for msg in &unreadable {
        tracing::warn!("{msg}");
    }
    print_json(&report)
}

async fn cmd_query(app: &App, request: &QueryRequest, json: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let response = app.engine().query(request, &cancel).await;
    if json {
        print_json(&response)?;
    } else {
        print_human(&response);
    }
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_human(resp: &QueryResponse) {
    if let Some(err) = &resp.error {
        eprintln!("Query failed: {err}");
        return;
    }
    println!(
        "{} results ({} mode, {:.3}s, context {} chars{})",
        resp.total_results,
        resp.mode,
        resp.query_time,
        resp.context_length,
        if resp.cache_hit { ", cached embedding" } else { "" }
    );
    for warning in &resp.warnings {
        println!("  warning: {warning}");
    }
    for (i, r) in resp.results.iter().enumerate() {
        let m = &r.metadata;
        println!(
            "\n  {}. score={:.4} (vector {:.3}, keyword {:.3})  {}/{}{}",
            i + 1,
            r.score,
            m.vector_score,
            m.keyword_score,
            m.index_name,
            m.document_name,
            if m.truncated { "  [truncated]" } else { "" }
        );
        println!("     {}", r.text);
    }
}
