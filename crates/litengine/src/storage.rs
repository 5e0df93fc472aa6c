//! # Storage Abstraction
//!
//! Where blob-producing transformers put their bytes.
//!
//! ## Philosophy
//!
//! - **URI-Addressed**: every object is named by a URI the storage minted or
//!   accepts. Literals carry only the URI.
//! - **Streaming**: objects are opened as async readers and writers; nothing
//!   here buffers a whole payload on behalf of the caller.

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use dashmap::DashMap;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum StorageError {
    /// Nothing is stored under the URI.
    NotFound(String),
    /// The URI does not belong to this storage.
    InvalidUri(String),
    /// Underlying I/O failure.
    Io(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(uri) => write!(f, "Not found: {}", uri),
            Self::InvalidUri(uri) => write!(f, "Invalid URI: {}", uri),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

pub type Reader = Box<dyn AsyncRead + Send + Unpin>;
pub type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// A place to read and write blob payloads.
///
/// This trait is object-safe (`Arc<dyn Storage>`).
#[async_trait::async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Mints a fresh URI ending in `hint`. Nothing is created yet.
    fn new_uri(&self, hint: &str) -> String;

    /// Opens `uri` for writing, replacing any previous content.
    ///
    /// Bytes become readable once the writer is flushed or shut down.
    async fn open_for_write(&self, uri: &str) -> Result<Writer>;

    async fn open_for_read(&self, uri: &str) -> Result<Reader>;

    async fn exists(&self, uri: &str) -> Result<bool>;
}

fn random_segment() -> String {
    format!("{:016x}", rand::random::<u64>())
}

// ============================================================================
//  MEMORY
// ============================================================================

const MEMORY_SCHEME: &str = "memory://";

/// Process-local storage keyed by `memory://` URIs.
#[derive(Clone, Debug)]
pub struct MemoryStorage {
    prefix: String,
    objects: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), objects: Arc::new(DashMap::new()) }
    }

    /// Returns a copy of the stored bytes.
    pub fn get(&self, uri: &str) -> Option<Vec<u8>> {
        self.objects.get(uri).map(|bytes| bytes.clone())
    }

    pub fn put(&self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.objects.insert(uri.into(), bytes);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn check(uri: &str) -> Result<()> {
        if uri.starts_with(MEMORY_SCHEME) {
            Ok(())
        } else {
            Err(StorageError::InvalidUri(uri.to_string()))
        }
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    fn new_uri(&self, hint: &str) -> String {
        format!("{}{}/{}/{}", MEMORY_SCHEME, self.prefix, random_segment(), hint)
    }

    async fn open_for_write(&self, uri: &str) -> Result<Writer> {
        Self::check(uri)?;
        debug!(uri, "opening memory object for write");
        Ok(Box::new(MemoryWriter {
            uri: uri.to_string(),
            buf: Vec::new(),
            objects: self.objects.clone(),
        }))
    }

    async fn open_for_read(&self, uri: &str) -> Result<Reader> {
        Self::check(uri)?;
        let bytes = self.get(uri).ok_or_else(|| StorageError::NotFound(uri.to_string()))?;
        Ok(Box::new(io::Cursor::new(bytes)))
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        Self::check(uri)?;
        Ok(self.objects.contains_key(uri))
    }
}

struct MemoryWriter {
    uri: String,
    buf: Vec<u8>,
    objects: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryWriter {
    fn publish(&self) {
        self.objects.insert(self.uri.clone(), self.buf.clone());
    }
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.get_mut().buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.publish();
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.publish();
        Poll::Ready(Ok(()))
    }
}

// ============================================================================
//  LOCAL FILESYSTEM
// ============================================================================

const FILE_SCHEME: &str = "file://";

/// Storage rooted at a local directory, addressed by `file://` URIs.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    prefix: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self { root: root.into(), prefix: prefix.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a URI to a path under the root, refusing anything that escapes it.
    fn path_of(&self, uri: &str) -> Result<PathBuf> {
        let invalid = || StorageError::InvalidUri(uri.to_string());
        let path = PathBuf::from(uri.strip_prefix(FILE_SCHEME).ok_or_else(invalid)?);
        let escapes = path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(invalid());
        }
        Ok(path)
    }
}

#[async_trait::async_trait]
impl Storage for LocalStorage {
    fn new_uri(&self, hint: &str) -> String {
        let path = self.root.join(&self.prefix).join(random_segment()).join(hint);
        format!("{}{}", FILE_SCHEME, path.display())
    }

    async fn open_for_write(&self, uri: &str) -> Result<Writer> {
        let path = self.path_of(uri)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(path = %path.display(), "opening file for write");
        Ok(Box::new(tokio::fs::File::create(&path).await?))
    }

    async fn open_for_read(&self, uri: &str) -> Result<Reader> {
        let path = self.path_of(uri)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(uri.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        let path = self.path_of(uri)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
