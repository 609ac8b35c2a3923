use findex::cli::{Cli, Commands, ConfigAction};
use findex::config::{Config, ConfigValidator};
use findex::embedding::{finding_embedding_text, EmbeddingProvider, FastEmbedProvider};
use findex::error::{FindexError, Result};
use findex::retrieval::HybridSearcher;
use findex::storage::{Database, FindingStore, FindingType, NewFinding};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Init => cmd_init(cli.config)?,
        Commands::Stats => cmd_stats(cli.config)?,
        Commands::Search {
            query,
            finding_type,
            json,
        } => cmd_search(cli.config, &query, finding_type, json)?,
        Commands::Ingest { file } => cmd_ingest(cli.config, &file)?,
        Commands::PurgeSession { session_id } => cmd_purge_session(cli.config, &session_id)?,
        Commands::Config { action } => cmd_config(cli.config, action)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "findex=debug" } else { "findex=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file, falling back to defaults when the standard file is absent
fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => {
            let path = Config::default_path()?;
            if path.exists() {
                Config::load(&path)
            } else {
                tracing::debug!("No config at {}, using defaults", path.display());
                let mut config = Config::default();
                config.apply_env_overrides();
                ConfigValidator::validate(&config)?;
                Ok(config)
            }
        }
    }
}

fn open_database(config: &Config) -> Result<Arc<Database>> {
    let db = Database::open_and_apply(&config.storage.db_path, config.embedding.dimension)?;
    Ok(Arc::new(db))
}

fn load_provider(config: &Config) -> Result<FastEmbedProvider> {
    let provider = FastEmbedProvider::new(&config.embedding.model)?;
    if provider.dimension() != config.embedding.dimension {
        return Err(FindexError::DimensionMismatch {
            expected: config.embedding.dimension,
            actual: provider.dimension(),
        });
    }
    Ok(provider)
}

fn cmd_init(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config)?;

    println!("✓ Database ready at {}", db.path().display());
    println!("  Embedding dimension: {}", db.dimension());
    Ok(())
}

fn cmd_stats(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config)?;
    let stats = db.stats()?;

    println!("=== findex statistics ===");
    println!("Database:   {}", db.path().display());
    println!("Sessions:   {}", stats.session_count);
    println!("Findings:   {}", stats.finding_count);
    println!("Embeddings: {}", stats.embedding_count);
    println!("Lexical:    {}", stats.lexical_count);
    for finding_type in FindingType::ALL {
        let count = stats.findings_by_type.get(&finding_type).copied().unwrap_or(0);
        println!("  {:<11} {}", finding_type.as_str(), count);
    }
    Ok(())
}

fn cmd_search(
    config_path: Option<PathBuf>,
    query: &str,
    finding_type: Option<FindingType>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config)?;
    let provider = load_provider(&config)?;

    let searcher = HybridSearcher::new(db, config.search.clone());
    let response = searcher.search_text(query, finding_type, &provider)?;

    if json {
        let output = serde_json::to_string_pretty(&response).map_err(|e| FindexError::Json {
            source: e,
            context: "Failed to serialize search results".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if response.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(());
    }

    for (position, result) in response.iter().enumerate() {
        let finding = &result.finding;
        println!(
            "{:>2}. [{}/{}] {}",
            position + 1,
            finding.finding_type,
            finding.severity,
            finding.content
        );
        if let Some(context) = &finding.context {
            println!("    context: {}", context);
        }
        println!(
            "    session {} · score {:.5} · vector {} · lexical {}",
            finding.session_id,
            result.fused_score,
            format_rank(result.vector_rank),
            format_rank(result.lexical_rank)
        );
    }
    Ok(())
}

fn format_rank(rank: Option<usize>) -> String {
    rank.map(|r| format!("#{}", r))
        .unwrap_or_else(|| "-".to_string())
}

fn cmd_ingest(config_path: Option<PathBuf>, file: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    let content = std::fs::read_to_string(file).map_err(|e| FindexError::Io {
        source: e,
        context: format!("Failed to read findings file: {}", file.display()),
    })?;
    let findings: Vec<NewFinding> =
        serde_json::from_str(&content).map_err(|e| FindexError::Json {
            source: e,
            context: format!("Failed to parse findings file: {}", file.display()),
        })?;

    let mut by_session: BTreeMap<String, Vec<NewFinding>> = BTreeMap::new();
    for finding in findings {
        by_session
            .entry(finding.session_id.clone())
            .or_default()
            .push(finding);
    }

    let db = open_database(&config)?;
    let provider = load_provider(&config)?;
    let store = FindingStore::new(db);

    for (session_id, findings) in by_session {
        let texts: Vec<String> = findings.iter().map(finding_embedding_text).collect();
        let embeddings = provider.embed_batch(&texts)?;
        let items: Vec<(NewFinding, Vec<f32>)> = findings.into_iter().zip(embeddings).collect();

        let ids = store.replace_session_findings(&session_id, &items)?;
        println!("✓ Session {}: {} findings indexed", session_id, ids.len());
    }
    Ok(())
}

fn cmd_purge_session(config_path: Option<PathBuf>, session_id: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let store = FindingStore::new(open_database(&config)?);

    let removed = store.delete_session_findings(session_id)?;
    println!("✓ Removed {} findings from session {}", removed, session_id);
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            Config::load(&path)?;
            println!("✓ Configuration is valid: {}", path.display());
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            if path.exists() && !force {
                return Err(FindexError::Config(format!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                )));
            }
            Config::default().save(&path)?;
            println!("✓ Configuration written to {}", path.display());
        }
    }
    Ok(())
}
