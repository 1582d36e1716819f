//! Code indexer feeding the semantic search tool
//!
//! Files are split into chunks, embedded in one batch per file and upserted
//! into the vector store. Chunking is deliberately simple:
//! - Python files split at top-level `def` / `class` / `async def`
//! - everything else every 100 lines
//! - each chunk capped at 4 000 chars, whole files at 100 000

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::IndexError;
use crate::ollama::Embedder;
use crate::qdrant::{Point, VectorStore};

/// Extensions picked up by `index_directory`
pub const SUPPORTED_EXTENSIONS: &[&str] = &["py", "js", "ts", "go", "rs", "java", "md"];

const MAX_CHUNK_LINES: usize = 100;
const MAX_CHUNK_CHARS: usize = 4000;
const MAX_FILE_CHARS: usize = 100_000;

const SKIPPED_DIRS: &[&str] = &["node_modules", "__pycache__", "venv", "target"];

lazy_static! {
    static ref PYTHON_DEFINITION: Regex =
        Regex::new(r"^(class |def |async def )").expect("valid regex");
}

/// One piece of a source file, stored as the point payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub content: String,
    pub path: String,
    pub language: String,
    pub chunk_index: usize,
}

/// Totals from an indexing pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub files: usize,
    pub chunks: usize,
    pub failures: usize,
}

/// Stable point id for a chunk: first 16 hex digits of md5("path:index")
pub fn chunk_id(path: &str, chunk_index: usize) -> u64 {
    let digest = md5::compute(format!("{}:{}", path, chunk_index));
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    u64::from_be_bytes(bytes)
}

fn cut_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

fn chunk_by_lines(content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    lines
        .chunks(MAX_CHUNK_LINES)
        .map(|group| group.join("\n"))
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

fn chunk_python(content: &str) -> Vec<String> {
    fn flush(current: &mut Vec<&str>, chunks: &mut Vec<String>) {
        let chunk = current.join("\n");
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        current.clear();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.split('\n') {
        if PYTHON_DEFINITION.is_match(line) && !current.is_empty() {
            flush(&mut current, &mut chunks);
        }
        current.push(line);
        if current.len() >= MAX_CHUNK_LINES {
            flush(&mut current, &mut chunks);
        }
    }
    if !current.is_empty() {
        flush(&mut current, &mut chunks);
    }

    if chunks.is_empty() {
        vec![content.to_string()]
    } else {
        chunks
    }
}

/// Split already-read file contents into chunks
pub fn chunk_text(path: &Path, content: &str) -> Vec<Chunk> {
    let content = cut_chars(content, MAX_FILE_CHARS);
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let pieces = if extension == "py" {
        chunk_python(content)
    } else {
        chunk_by_lines(content)
    };

    let language = if extension.is_empty() {
        "text".to_string()
    } else {
        extension
    };

    pieces
        .into_iter()
        .enumerate()
        .map(|(chunk_index, piece)| Chunk {
            content: cut_chars(&piece, MAX_CHUNK_CHARS).to_string(),
            path: path.display().to_string(),
            language: language.clone(),
            chunk_index,
        })
        .collect()
}

/// Read and chunk a file. Unreadable (e.g. binary) files yield no chunks.
pub fn chunk_file(path: &Path) -> Vec<Chunk> {
    match std::fs::read_to_string(path) {
        Ok(content) => chunk_text(path, &content),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable file");
            Vec::new()
        }
    }
}

/// Embed and upsert one file's chunks; returns the number of points written
pub async fn index_file(
    path: &Path,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    collection: &str,
) -> Result<usize, IndexError> {
    let chunks = chunk_file(path);
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != chunks.len() {
        return Err(IndexError::EmbeddingCount {
            chunks: chunks.len(),
            embeddings: embeddings.len(),
        });
    }

    let points: Vec<Point> = chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, vector)| Point {
            id: chunk_id(&chunk.path, chunk.chunk_index),
            vector,
            payload: serde_json::to_value(chunk).unwrap_or_default(),
        })
        .collect();

    let count = points.len();
    store.upsert(collection, points).await?;
    Ok(count)
}

fn is_skipped(entry: &DirEntry) -> bool {
    // The walk root itself may be "." and must not be skipped
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Files under `root` that `index_directory` would index, sorted
pub fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Index every supported file under `root`.
///
/// The collection is created on first use, sized from the first embedding.
/// A failure on one file is logged and counted; the pass continues.
pub async fn index_directory(
    root: &Path,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    collection: &str,
) -> Result<IndexReport, IndexError> {
    let files = collect_files(root);
    let mut report = IndexReport::default();
    if files.is_empty() {
        return Ok(report);
    }

    let sample = embedder.embed("dimension sample").await?;
    store.ensure_collection(collection, sample.len()).await?;

    for path in files {
        match index_file(&path, embedder, store, collection).await {
            Ok(0) => {}
            Ok(count) => {
                info!(path = %path.display(), chunks = count, "Indexed file");
                report.files += 1;
                report.chunks += count;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to index file");
                report.failures += 1;
            }
        }
    }

    Ok(report)
}
