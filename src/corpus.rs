//! Reading and writing corpus files.
//!
//! A corpus is a JSON array of post objects. Posts are validated one by one
//! on load so a bad record can be reported by position, and the enriched
//! corpus is written through a temporary file so the target is either fully
//! replaced or left untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::models::{EnrichedPost, Post};

/// Errors from loading or writing a corpus file.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} must contain a JSON array of posts", path.display())]
    NotAnArray { path: PathBuf },

    /// A record lacks a required field or has a field of the wrong type.
    #[error("post {index} is structurally invalid: {source}")]
    StructuralInput {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

impl CorpusError {
    /// Whether the error was caused by the input data rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Json { .. } | Self::NotAnArray { .. } | Self::StructuralInput { .. }
        )
    }
}

/// Loads a corpus of raw posts from a JSON file.
///
/// # Errors
///
/// Returns `CorpusError::StructuralInput` with the record's position if any
/// element is not a valid post, and the other variants for unreadable or
/// non-array files.
pub fn load_posts(path: &Path) -> Result<Vec<Post>, CorpusError> {
    let content = fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let posts = parse_posts(&content).map_err(|e| match e {
        ParseFailure::Json(source) => CorpusError::Json {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::NotAnArray => CorpusError::NotAnArray {
            path: path.to_path_buf(),
        },
        ParseFailure::Post { index, source } => CorpusError::StructuralInput { index, source },
    })?;

    info!(path = %path.display(), posts = posts.len(), "loaded corpus");
    Ok(posts)
}

enum ParseFailure {
    Json(serde_json::Error),
    NotAnArray,
    Post {
        index: usize,
        source: serde_json::Error,
    },
}

fn parse_posts(content: &str) -> Result<Vec<Post>, ParseFailure> {
    let document: Value = serde_json::from_str(content).map_err(ParseFailure::Json)?;
    let Value::Array(records) = document else {
        return Err(ParseFailure::NotAnArray);
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value(record).map_err(|source| ParseFailure::Post { index, source })
        })
        .collect()
}

/// Writes the enriched corpus as JSON indented with four spaces.
///
/// Missing parent directories are created. The file is written next to the
/// target and then moved into place.
///
/// # Errors
///
/// Returns `CorpusError::Io` or `CorpusError::Persist` if the file cannot be
/// written or moved into place.
pub fn write_posts(path: &Path, posts: &[EnrichedPost]) -> Result<(), CorpusError> {
    let dir = ensure_parent_directory(path)?;
    let io_error = |source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = NamedTempFile::new_in(&dir).map_err(io_error)?;
    let mut serializer = serde_json::Serializer::with_formatter(
        file.as_file_mut(),
        PrettyFormatter::with_indent(b"    "),
    );
    posts.serialize(&mut serializer).map_err(|source| CorpusError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    file.as_file_mut().flush().map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;

    file.persist(path).map_err(|source| CorpusError::Persist {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), posts = posts.len(), "wrote enriched corpus");
    Ok(())
}

/// Creates the parent directory of `path` if needed and returns it.
fn ensure_parent_directory(path: &Path) -> Result<PathBuf, CorpusError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|source| CorpusError::Io {
        path: parent.clone(),
        source,
    })?;
    Ok(parent)
}
