use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("request to {uri} failed: {message}")]
    Remote { uri: String, message: String },
    #[error("remote fetching is disabled: {0}")]
    RemoteDisabled(String),
}

/// Resolves a URI or path to raw text.
pub trait Fetcher {
    fn fetch(&self, uri: &str) -> Result<String, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<String, FetchError>,
{
    fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        self(uri)
    }
}

pub fn is_remote(uri: &str) -> bool {
    let lowered = uri.get(..8).unwrap_or(uri).to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

/// Reads local files, resolving relative paths against `base_dir`.
#[derive(Clone, Debug, Default)]
pub struct FileFetcher {
    base_dir: PathBuf,
}

impl FileFetcher {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolve(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        let path = self.resolve(uri);
        if !path.is_file() {
            return Err(FetchError::NotFound(path));
        }
        log::debug!("reading {}", path.display());
        fs::read_to_string(&path).map_err(|source| FetchError::Io { path, source })
    }
}

/// Blocking HTTP(S) client.
#[cfg(feature = "remote")]
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "remote")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        let remote = |err: reqwest::Error| FetchError::Remote {
            uri: uri.to_string(),
            message: err.to_string(),
        };
        log::debug!("fetching {uri}");
        let response = self.client.get(uri).send().map_err(remote)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Remote {
                uri: uri.to_string(),
                message: format!("HTTP {status}"),
            });
        }
        response.text().map_err(remote)
    }
}

/// Dispatches on the URI scheme: HTTP(S) goes to the network, the rest to disk.
#[derive(Clone, Debug)]
pub struct DefaultFetcher {
    files: FileFetcher,
    #[cfg(feature = "remote")]
    http: Option<HttpFetcher>,
}

impl DefaultFetcher {
    pub fn new(base_dir: impl Into<PathBuf>, allow_remote: bool) -> Self {
        #[cfg(not(feature = "remote"))]
        let _ = allow_remote;
        Self {
            files: FileFetcher::new(base_dir),
            #[cfg(feature = "remote")]
            http: allow_remote.then(HttpFetcher::new),
        }
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        if !is_remote(uri) {
            return self.files.fetch(uri);
        }
        #[cfg(feature = "remote")]
        if let Some(http) = &self.http {
            return http.fetch(uri);
        }
        Err(FetchError::RemoteDisabled(uri.to_string()))
    }
}
