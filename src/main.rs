mod config;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use quarry_embed::EmbeddingService;
use quarry_embed::openai::OpenAiEmbedder;
use quarry_index::{
    Chunker, ChunkerConfig, FilterValue, IngestionPipeline, LocalVectorStore, RetrievalConfig,
    Retriever, SearchFilters, SearchQuery,
};

use config::Config;

#[derive(Parser)]
#[command(name = "quarry", version, about = "Chunk, embed, and search document corpora locally")]
struct Cli {
    /// Configuration file path (default: quarry.toml, then built-in defaults).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files or directories into the corpus.
    Ingest { paths: Vec<PathBuf> },
    /// Query the corpus with hybrid semantic + keyword search.
    Search {
        question: String,
        /// Number of results to return (default: search.max_results).
        #[arg(long)]
        top_k: Option<usize>,
        /// Lower bound of an inclusive publication-year filter.
        #[arg(long)]
        year_from: Option<i64>,
        /// Upper bound of an inclusive publication-year filter.
        #[arg(long)]
        year_to: Option<i64>,
        /// Metadata equality filter as key=value; repeatable.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,
    },
    /// List stored documents.
    List,
    /// Remove a document and its chunks by id.
    Remove { document_id: String },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config.validate()?;

    match cli.command {
        Command::Ingest { paths } => run_ingest(&config, &paths).await,
        Command::Search {
            question,
            top_k,
            year_from,
            year_to,
            filters,
        } => run_search(&config, question, top_k, year_from, year_to, filters).await,
        Command::List => run_list(&config).await,
        Command::Remove { document_id } => run_remove(&config, &document_id).await,
    }
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("QUARRY_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("quarry.toml")
}

fn build_service(config: &Config) -> EmbeddingService<OpenAiEmbedder> {
    let provider = config.embedding.base_url.as_ref().map(|base_url| {
        OpenAiEmbedder::new(
            base_url.clone(),
            config::api_key(),
            config.embedding.model.clone(),
        )
    });
    if provider.is_none() {
        tracing::info!("no embedding endpoint configured, using deterministic offline embeddings");
    }
    EmbeddingService::new(
        provider,
        config.embedding.batch_size,
        config.embedding.dimension,
    )
}

fn build_chunker(config: &Config) -> anyhow::Result<Chunker> {
    Chunker::new(ChunkerConfig {
        max_characters: config.chunking.max_characters,
        overlap: config.chunking.overlap,
        max_tokens: config.chunking.max_tokens,
        approx_tokens_per_char: config.chunking.approx_tokens_per_char,
    })
    .context("invalid chunking configuration")
}

/// Expand files and directories into a flat list of candidate files.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in ignore::WalkBuilder::new(path).build().flatten() {
                if entry.file_type().is_some_and(|ft| ft.is_file()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

async fn run_ingest(config: &Config, paths: &[PathBuf]) -> anyhow::Result<()> {
    anyhow::ensure!(!paths.is_empty(), "nothing to ingest");

    let store = LocalVectorStore::open(config.store.path.as_str()).await?;
    let pipeline = IngestionPipeline::new(build_chunker(config)?, build_service(config), store)
        .with_supported_extensions(config.ingest.supported_file_types.clone())
        .with_max_file_size(config.ingest.max_file_size);

    let files = collect_files(paths);
    let total = files.len();
    let mut ingested = 0usize;
    let mut duplicates = 0usize;
    let mut failed = 0usize;

    for file in &files {
        match pipeline.ingest_file(file).await {
            Ok(result) if result.duplicate => {
                duplicates += 1;
                println!("duplicate  {}  {}", result.document_id, file.display());
            }
            Ok(result) => {
                ingested += 1;
                println!(
                    "ingested   {}  {} ({} chunks)",
                    result.document_id,
                    file.display(),
                    result.chunks_indexed
                );
            }
            Err(e) => {
                failed += 1;
                tracing::error!(file = %file.display(), "ingestion failed: {e}");
            }
        }
    }

    println!("{ingested}/{total} ingested, {duplicates} duplicates, {failed} failed");
    Ok(())
}

async fn run_search(
    config: &Config,
    question: String,
    top_k: Option<usize>,
    year_from: Option<i64>,
    year_to: Option<i64>,
    filters: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let store = LocalVectorStore::open(config.store.path.as_str()).await?;
    let retriever = Retriever::new(build_service(config), store, RetrievalConfig {
        hybrid_weight: config.search.hybrid_weight,
        rerank_top_k: config.search.rerank_top_k,
        metadata_filter_fields: config.search.metadata_filter_fields.clone(),
    });

    let query = SearchQuery {
        question,
        max_results: top_k.unwrap_or(config.search.max_results),
        filters: build_filters(year_from, year_to, filters),
    };
    let results = retriever.retrieve(&query).await?;

    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for (rank, result) in results.iter().enumerate() {
        let title = result
            .metadata
            .get("title")
            .map_or("untitled", String::as_str);
        println!("{:>2}. [{:.3}] {title}", rank + 1, result.score);
        println!("    {}", excerpt(&result.content, 200));
    }
    Ok(())
}

fn build_filters(
    year_from: Option<i64>,
    year_to: Option<i64>,
    filters: Vec<(String, String)>,
) -> Option<SearchFilters> {
    if year_from.is_none() && year_to.is_none() && filters.is_empty() {
        return None;
    }

    let year_range = (year_from.is_some() || year_to.is_some())
        .then(|| (year_from.unwrap_or(0), year_to.unwrap_or(9999)));

    let mut fields: HashMap<String, FilterValue> = HashMap::new();
    for (key, value) in filters {
        match fields.remove(&key) {
            None => {
                fields.insert(key, FilterValue::One(value));
            }
            Some(FilterValue::One(existing)) => {
                fields.insert(key, FilterValue::Many(vec![existing, value]));
            }
            Some(FilterValue::Many(mut values)) => {
                values.push(value);
                fields.insert(key, FilterValue::Many(values));
            }
        }
    }

    Some(SearchFilters { year_range, fields })
}

fn excerpt(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_owned();
    }
    let cut: String = content.chars().take(max_chars).collect();
    format!("{cut}…")
}

async fn run_list(config: &Config) -> anyhow::Result<()> {
    let store = LocalVectorStore::open(config.store.path.as_str()).await?;
    let documents = store.list_documents().await?;

    if documents.is_empty() {
        println!("store is empty");
        return Ok(());
    }
    for doc in &documents {
        println!(
            "{}  {}  year={}  chunks={}",
            doc.id,
            doc.title.as_deref().unwrap_or("untitled"),
            doc.year.map_or_else(|| "-".to_owned(), |y| y.to_string()),
            doc.chunks
        );
    }
    Ok(())
}

async fn run_remove(config: &Config, document_id: &str) -> anyhow::Result<()> {
    let store = LocalVectorStore::open(config.store.path.as_str()).await?;
    if store.remove_document(document_id).await? {
        println!("removed {document_id}");
    } else {
        println!("no document with id {document_id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_val_parsing() {
        assert_eq!(
            parse_key_val("journal=Nature").unwrap(),
            ("journal".to_owned(), "Nature".to_owned())
        );
        assert_eq!(
            parse_key_val("a=b=c").unwrap(),
            ("a".to_owned(), "b=c".to_owned())
        );
        assert!(parse_key_val("no-separator").is_err());
    }

    #[test]
    fn no_criteria_means_no_filters() {
        assert!(build_filters(None, None, vec![]).is_none());
    }

    #[test]
    fn year_bounds_fill_in_missing_side() {
        let filters = build_filters(Some(2020), None, vec![]).unwrap();
        assert_eq!(filters.year_range, Some((2020, 9999)));
        let filters = build_filters(None, Some(2024), vec![]).unwrap();
        assert_eq!(filters.year_range, Some((0, 2024)));
    }

    #[test]
    fn repeated_filter_keys_merge_into_many() {
        let filters = build_filters(None, None, vec![
            ("journal".to_owned(), "Nature".to_owned()),
            ("journal".to_owned(), "Science".to_owned()),
        ])
        .unwrap();
        match filters.fields.get("journal").unwrap() {
            FilterValue::Many(values) => {
                assert_eq!(values, &vec!["Nature".to_owned(), "Science".to_owned()]);
            }
            FilterValue::One(_) => panic!("expected Many"),
        }
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("short", 10), "short");
        let long = "x".repeat(300);
        let cut = excerpt(&long, 200);
        assert_eq!(cut.chars().count(), 201);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn config_path_resolution_prefers_cli() {
        let path = resolve_config_path(Some(Path::new("/tmp/custom.toml")));
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn cli_parses_search_subcommand() {
        let cli = Cli::try_parse_from([
            "quarry", "search", "what is x", "--top-k", "5", "--filter", "journal=Nature",
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                question,
                top_k,
                filters,
                ..
            } => {
                assert_eq!(question, "what is x");
                assert_eq!(top_k, Some(5));
                assert_eq!(filters.len(), 1);
            }
            _ => panic!("expected search subcommand"),
        }
    }
}
