use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Remote returned {status} {reason} for {url}")]
    Status {
        status: u16,
        reason: String,
        url: String,
    },

    #[error("Unexpected payload from {url}: {message}")]
    UnexpectedPayload { url: String, message: String },

    #[error("No download location for {0}")]
    MissingDownloadUrl(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, submodules and anything else the listing may report.
    #[serde(other)]
    Other,
}

/// One item of a repository directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl RepoEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }
}

/// Read access to one repository tree.
///
/// Implementations never retry; a failed call surfaces as a [`FetchError`].
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Lists the directory at `path` (relative to the repository root).
    async fn list_directory(&self, path: &str) -> Result<Vec<RepoEntry>, FetchError>;

    /// Returns the text content of a file entry.
    async fn fetch_file(&self, entry: &RepoEntry) -> Result<String, FetchError>;
}

/// Serves a checked-out repository from disk.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    root: PathBuf,
}

impl LocalFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

#[async_trait]
impl RepositoryFetcher for LocalFetcher {
    async fn list_directory(&self, path: &str) -> Result<Vec<RepoEntry>, FetchError> {
        let dir = self.resolve(path);
        let io_err = |source| FetchError::Io {
            path: dir.clone(),
            source,
        };

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&dir).await.map_err(io_err)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(io_err)? {
            let file_type = entry.file_type().await.map_err(io_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            let rel_path = match path.trim_matches('/') {
                "" => name.clone(),
                base => format!("{}/{}", base, name),
            };

            entries.push(RepoEntry {
                download_url: (kind == EntryKind::File)
                    .then(|| entry.path().to_string_lossy().into_owned()),
                name,
                kind,
                path: rel_path,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn fetch_file(&self, entry: &RepoEntry) -> Result<String, FetchError> {
        let path = self.resolve(&entry.path);
        fs::read_to_string(&path)
            .await
            .map_err(|source| FetchError::Io { path, source })
    }
}
