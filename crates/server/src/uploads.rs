//! Multipart upload staging and object storage backends.

use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};
use axum::extract::multipart::Field;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{Config, UploadBackend},
    error::{AppError, ConfigError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    IdDocument,
    Gallery,
}

impl UploadKind {
    /// Leading path segment of every stored object of this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            UploadKind::IdDocument => "id-documents",
            UploadKind::Gallery => "gallery",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::IdDocument => &["jpg", "jpeg", "png", "webp", "heic", "pdf"],
            UploadKind::Gallery => &["jpg", "jpeg", "png", "webp", "heic"],
        }
    }
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// A validated upload held in a temp file. The file is deleted on drop unless stored.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    kind: UploadKind,
    extension: String,
    size: u64,
}

impl StagedUpload {
    /// Streams a multipart field into the staging directory, enforcing type and size limits
    pub async fn from_field(
        mut field: Field<'_>,
        kind: UploadKind,
        staging_dir: &Path,
        max_bytes: u64,
    ) -> Result<Self> {
        let field_name = field.name().unwrap_or("file").to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let extension = extension_of(&file_name, kind).map_err(|msg| AppError::validation(&field_name, msg))?;

        std::fs::create_dir_all(staging_dir)
            .map_err(|e| AppError::Internal(format!("create staging dir: {}", e)))?;
        let mut file = NamedTempFile::new_in(staging_dir)
            .map_err(|e| AppError::Internal(format!("create temp file: {}", e)))?;

        let mut size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(format!("Upload interrupted: {}", e)))?
        {
            size += chunk.len() as u64;
            if size > max_bytes {
                return Err(AppError::validation(
                    &field_name,
                    format!(
                        "{} is larger than the {} MB limit",
                        display_name(&file_name),
                        max_bytes / (1024 * 1024)
                    ),
                ));
            }
            file.write_all(&chunk)
                .map_err(|e| AppError::Internal(format!("write temp file: {}", e)))?;
        }

        if size == 0 {
            return Err(AppError::validation(
                &field_name,
                format!("{} is empty", display_name(&file_name)),
            ));
        }
        file.flush()
            .map_err(|e| AppError::Internal(format!("flush temp file: {}", e)))?;

        tracing::debug!("Staged {} ({} bytes) at {}", file_name, size, file.path().display());
        Ok(Self {
            file,
            kind,
            extension,
            size,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// `{kind}/{uuid}.{ext}`
    pub fn object_key(&self) -> String {
        format!("{}/{}.{}", self.kind.prefix(), Uuid::new_v4(), self.extension)
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.extension)
    }
}

fn display_name(file_name: &str) -> &str {
    if file_name.is_empty() {
        "The file"
    } else {
        file_name
    }
}

/// Lowercased extension if `kind` accepts it
fn extension_of(file_name: &str, kind: UploadKind) -> std::result::Result<String, String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if kind.allowed_extensions().contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(format!(
            "{} has an unsupported file type. Allowed: {}",
            display_name(file_name),
            kind.allowed_extensions().join(", ")
        ))
    }
}

// ============================================================================
// Object storage
// ============================================================================

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("s3: {0}")]
    S3(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Upstream {
            service: "storage",
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the staged file under `key` and returns its public URL
    async fn put(&self, key: &str, upload: StagedUpload) -> Result<String, StorageError>;

    /// Removes an object previously returned by `put`. URLs this store does not own are ignored.
    async fn remove(&self, url: &str) -> Result<(), StorageError>;
}

/// Best-effort removal of objects that no row will point to
pub async fn discard(store: &dyn ObjectStore, urls: &[String]) {
    for url in urls {
        if let Err(e) = store.remove(url).await {
            tracing::warn!("Could not remove orphaned upload {}: {}", url, e);
        }
    }
}

pub struct LocalStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let key = url.strip_prefix(&self.public_prefix)?.trim_start_matches('/');
        // Keys never contain parent segments
        if key.is_empty() || key.split('/').any(|part| part == ".." || part.is_empty()) {
            return None;
        }
        Some(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, upload: StagedUpload) -> Result<String, StorageError> {
        let dest = self.root.join(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Rename when staging shares a filesystem, copy otherwise
        if let Err(e) = upload.file.persist(&dest) {
            tokio::fs::copy(e.file.path(), &dest).await?;
        }
        tracing::info!("Stored upload at {}", dest.display());
        Ok(format!("{}/{}", self.public_prefix, key))
    }

    async fn remove(&self, url: &str) -> Result<(), StorageError> {
        let Some(path) = self.path_for_url(url) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct S3Store {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3Store {
    pub async fn from_config(bucket: &str, region: Option<&str>, public_base_url: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let aws_config = loader.load().await;
        Self {
            client: S3Client::new(&aws_config),
            bucket: bucket.to_string(),
            public_base_url: public_base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket)),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, upload: StagedUpload) -> Result<String, StorageError> {
        let body = ByteStream::from_path(upload.path())
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(upload.content_type())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "S3 upload failed");
                StorageError::S3(e.to_string())
            })?;
        tracing::info!("Uploaded {} ({} bytes) to s3://{}", key, upload.size(), self.bucket);
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn remove(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = url
            .strip_prefix(&self.public_base_url)
            .map(|k| k.trim_start_matches('/'))
        else {
            return Ok(());
        };
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;
        tracing::info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

/// Builds the configured storage backend
pub async fn build_store(config: &Config) -> Result<Box<dyn ObjectStore>, ConfigError> {
    match config.uploads.backend {
        UploadBackend::Local => Ok(Box::new(LocalStore::new(
            &config.uploads.dir,
            &config.uploads.public_prefix,
        ))),
        UploadBackend::S3 => {
            let bucket = config.s3.bucket.as_deref().ok_or(ConfigError::Missing("S3_BUCKET"))?;
            Ok(Box::new(
                S3Store::from_config(bucket, config.s3.region.as_deref(), config.s3.public_base_url.as_deref())
                    .await,
            ))
        }
    }
}

#[cfg(test)]
impl StagedUpload {
    /// Stages in-memory bytes as if they had arrived in a multipart field
    pub fn from_bytes(bytes: &[u8], file_name: &str, kind: UploadKind, staging_dir: &Path) -> Self {
        let extension = extension_of(file_name, kind).unwrap();
        let mut file = NamedTempFile::new_in(staging_dir).unwrap();
        file.write_all(bytes).unwrap();
        Self {
            file,
            kind,
            extension,
            size: bytes.len() as u64,
        }
    }
}
