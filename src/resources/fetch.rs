//! Byte sources for assets.
//!
//! Native builds read from an asset directory, WASM builds issue HTTP GETs relative
//! to the page. Both hide behind [`AssetFetcher`] so the load pipeline does not care.

use std::collections::HashMap;

use futures::{
    FutureExt, StreamExt,
    future::{self, LocalBoxFuture},
    stream::{self, LocalBoxStream},
};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("asset {0} does not exist")]
    NotFound(String),
    #[error("request for {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(target_arch = "wasm32")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// A piece of an asset as it arrives, with the total size if the source knows it.
#[derive(Debug, Clone)]
pub struct FetchChunk {
    pub bytes: Vec<u8>,
    pub total: Option<u64>,
}

pub trait AssetFetcher {
    /// Fetches the whole asset.
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>>;

    /// Fetches the asset chunk by chunk so callers can report progress.
    ///
    /// The default yields the whole asset as a single chunk with a known total.
    fn fetch_chunked<'a>(
        &'a self,
        url: &'a str,
    ) -> LocalBoxStream<'a, Result<FetchChunk, FetchError>> {
        self.fetch(url)
            .map(|result| {
                result.map(|bytes| FetchChunk {
                    total: Some(bytes.len() as u64),
                    bytes,
                })
            })
            .into_stream()
            .boxed_local()
    }
}

/// Serves assets held in memory, e.g. bundled with `include_bytes!`.
///
/// URLs can also be registered as failing to simulate broken deployments.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    assets: HashMap<String, Vec<u8>>,
    failures: HashMap<String, String>,
    chunk_size: Option<usize>,
    report_total: bool,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self {
            report_total: true,
            ..Default::default()
        }
    }

    pub fn with_asset(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(url.into(), bytes.into());
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(url.into(), reason.into());
        self
    }

    /// Split chunked fetches into pieces of `size` bytes.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Pretend the total size is unknown, like a response without `Content-Length`.
    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    fn lookup(&self, url: &str) -> Result<&Vec<u8>, FetchError> {
        if let Some(reason) = self.failures.get(url) {
            return Err(FetchError::Other(reason.clone()));
        }
        self.assets
            .get(url)
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

impl AssetFetcher for MemoryFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        future::ready(self.lookup(url).cloned()).boxed_local()
    }

    fn fetch_chunked<'a>(
        &'a self,
        url: &'a str,
    ) -> LocalBoxStream<'a, Result<FetchChunk, FetchError>> {
        let bytes = match self.lookup(url) {
            Ok(bytes) => bytes,
            Err(e) => return stream::once(future::ready(Err(e))).boxed_local(),
        };
        let total = self.report_total.then_some(bytes.len() as u64);
        let size = self.chunk_size.unwrap_or(bytes.len().max(1));
        let chunks: Vec<_> = bytes
            .chunks(size)
            .map(|chunk| {
                Ok(FetchChunk {
                    bytes: chunk.to_vec(),
                    total,
                })
            })
            .collect();
        stream::iter(chunks).boxed_local()
    }
}

/// Reads assets from a directory. URLs are interpreted relative to `root`.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: std::path::PathBuf,
    chunk_size: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl FsFetcher {
    const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn path_for(&self, url: &str) -> std::path::PathBuf {
        let relative = url.trim_start_matches("./").trim_start_matches('/');
        self.root.join(relative)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetFetcher for FsFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        async move {
            let path = self.path_for(url);
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(FetchError::NotFound(path.display().to_string()))
                }
                Err(e) => Err(e.into()),
            }
        }
        .boxed_local()
    }

    fn fetch_chunked<'a>(
        &'a self,
        url: &'a str,
    ) -> LocalBoxStream<'a, Result<FetchChunk, FetchError>> {
        use tokio::io::AsyncReadExt;

        enum Read {
            Closed(std::path::PathBuf),
            Open(tokio::fs::File, Option<u64>),
            Done,
        }

        let chunk_size = self.chunk_size;
        stream::unfold(Read::Closed(self.path_for(url)), move |read| async move {
            let (mut file, total) = match read {
                Read::Done => return None,
                Read::Open(file, total) => (file, total),
                Read::Closed(path) => match tokio::fs::File::open(&path).await {
                    Ok(file) => {
                        let total = file.metadata().await.ok().map(|m| m.len());
                        (file, total)
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        let err = FetchError::NotFound(path.display().to_string());
                        return Some((Err(err), Read::Done));
                    }
                    Err(e) => return Some((Err(e.into()), Read::Done)),
                },
            };
            let mut buf = vec![0; chunk_size];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    let chunk = FetchChunk { bytes: buf, total };
                    Some((Ok(chunk), Read::Open(file, total)))
                }
                Err(e) => Some((Err(e.into()), Read::Done)),
            }
        })
        .boxed_local()
    }
}

/// Fetches assets over HTTP relative to the current page.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(target_arch = "wasm32")]
impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    // reqwest needs absolute URLs, so resolve against the page like the browser would.
    fn absolute_url(url: &str) -> Result<reqwest::Url, FetchError> {
        let href = web_sys::window()
            .and_then(|window| window.location().href().ok())
            .ok_or_else(|| FetchError::Other("no window location available".to_string()))?;
        let page = reqwest::Url::parse(&href).map_err(|e| FetchError::Other(e.to_string()))?;
        page.join(url).map_err(|e| FetchError::Other(e.to_string()))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self.client.get(Self::absolute_url(url)?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[cfg(target_arch = "wasm32")]
impl AssetFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        async move { Ok::<_, FetchError>(self.get(url).await?.bytes().await?.to_vec()) }
            .boxed_local()
    }

    fn fetch_chunked<'a>(
        &'a self,
        url: &'a str,
    ) -> LocalBoxStream<'a, Result<FetchChunk, FetchError>> {
        async move {
            let response = self.get(url).await?;
            let total = response.content_length();
            let bytes = response.bytes().await?.to_vec();
            Ok::<_, FetchError>(FetchChunk { bytes, total })
        }
        .into_stream()
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_fetcher_splits_chunks() {
        let fetcher = MemoryFetcher::new()
            .with_asset("a.bin", vec![1u8; 10])
            .with_chunk_size(4);
        let chunks: Vec<_> = fetcher.fetch_chunked("a.bin").collect().await;
        let sizes: Vec<_> = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().bytes.len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert!(chunks.iter().all(|c| c.as_ref().unwrap().total == Some(10)));
    }

    #[tokio::test]
    async fn memory_fetcher_reports_missing_and_failing_assets() {
        let fetcher = MemoryFetcher::new().with_failure("broken.png", "connection reset");
        assert!(matches!(
            fetcher.fetch("missing.png").await,
            Err(FetchError::NotFound(_))
        ));
        assert!(matches!(
            fetcher.fetch("broken.png").await,
            Err(FetchError::Other(reason)) if reason == "connection reset"
        ));
    }

    #[tokio::test]
    async fn fs_fetcher_reads_relative_to_root() {
        let dir = std::env::temp_dir().join(format!("green-apple-fetch-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("img")).unwrap();
        std::fs::write(dir.join("img/data.txt"), b"apple").unwrap();

        let fetcher = FsFetcher::new(&dir);
        assert_eq!(fetcher.fetch("./img/data.txt").await.unwrap(), b"apple");

        let chunks: Vec<_> = fetcher.fetch_chunked("./img/data.txt").collect().await;
        assert_eq!(chunks.len(), 1);
        let chunk = chunks.into_iter().next().unwrap().unwrap();
        assert_eq!(chunk.total, Some(5));
        assert_eq!(chunk.bytes, b"apple");

        assert!(matches!(
            fetcher.fetch("./img/none.txt").await,
            Err(FetchError::NotFound(_))
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
