//! Reads worker definitions from a directory of properties files.
//!
//! Every regular file below the worker directory is one record:
//!
//! ```text
//! # build farm node
//! name = alpha
//! host = 10.0.0.1
//! subworkers = 3
//! ```
//!
//! `subworkers` defaults to 2 when absent. Files are visited in lexical path
//! order so that, among duplicate names, the same file wins on every start.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{ReservoirError, Result};
use crate::fleet::WorkerSpec;

pub const DEFAULT_SUBWORKERS: u32 = 2;

/// Problem with a single record. The rest of the directory is still loaded.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: expected \"key = value\"")]
    Malformed { path: PathBuf, line: usize },

    #[error("{path}: invalid value {value:?} for \"{key}\"")]
    InvalidValue {
        path: PathBuf,
        key: &'static str,
        value: String,
    },
}

pub type SpecRecord = std::result::Result<WorkerSpec, RecordError>;

/// Produces the worker definitions for one run.
pub trait WorkerSpecSource {
    /// Load every record. `Err` means the configuration as a whole is
    /// inaccessible; per-record problems come back inside the vector.
    fn load(&self) -> Result<Vec<SpecRecord>>;
}

/// Source backed by a directory tree of properties files.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        let access = |source| ReservoirError::ConfigAccess {
            path: dir.to_path_buf(),
            source,
        };

        // `DirEntry::file_type` does not follow symlinks, so a link back to
        // an ancestor is read as a record instead of walked.
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).map_err(access)? {
            let entry = entry.map_err(access)?;
            let is_dir = entry.file_type().map_err(access)?.is_dir();
            entries.push((entry.path(), is_dir));
        }
        entries.sort();

        for (path, is_dir) in entries {
            if is_dir {
                self.walk(&path, files)?;
            } else {
                files.push(path);
            }
        }
        Ok(())
    }
}

impl WorkerSpecSource for DirectorySource {
    fn load(&self) -> Result<Vec<SpecRecord>> {
        let metadata = fs::metadata(&self.root).map_err(|source| ReservoirError::ConfigAccess {
            path: self.root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ReservoirError::ConfigAccess {
                path: self.root.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let mut files = Vec::new();
        self.walk(&self.root, &mut files)?;

        Ok(files
            .into_iter()
            .map(|path| {
                tracing::info!(path = %path.display(), "Loading worker configuration");
                load_spec(&path)
            })
            .collect())
    }
}

/// Parse one properties file into a [`WorkerSpec`].
pub fn load_spec(path: &Path) -> SpecRecord {
    let contents = fs::read_to_string(path).map_err(|source| RecordError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let props = parse_properties(&contents).map_err(|line| RecordError::Malformed {
        path: path.to_path_buf(),
        line,
    })?;

    let subworker_count = match props.get("subworkers") {
        None => DEFAULT_SUBWORKERS,
        Some(raw) => raw.parse::<u32>().map_err(|_| RecordError::InvalidValue {
            path: path.to_path_buf(),
            key: "subworkers",
            value: raw.clone(),
        })?,
    };

    let get = |key: &str| props.get(key).cloned().unwrap_or_default();
    Ok(WorkerSpec::new(get("name"), get("host"), subworker_count).with_origin(path))
}

/// Parse `key = value` / `key: value` lines. `#` and `!` start comments.
///
/// Returns the 1-based number of the first line that has no separator.
pub fn parse_properties(contents: &str) -> std::result::Result<HashMap<String, String>, usize> {
    let mut props = HashMap::new();
    for (n, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let split = line
            .find(['=', ':'])
            .ok_or(n + 1)?;
        let key = line[..split].trim();
        if key.is_empty() {
            return Err(n + 1);
        }
        let value = line[split + 1..].trim();
        props.insert(key.to_string(), value.to_string());
    }
    Ok(props)
}
