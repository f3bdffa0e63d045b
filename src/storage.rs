use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{AppConfig, CdnConfig, UploadStrategyKind};

/// Sorted, as they are reported back to clients.
pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpeg", "jpg", "png", "svg", "tiff", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["avi", "flv", "mkv", "mov", "mp4", "webm", "wmv"];

/// Every URL produced by the local strategy starts with this prefix.
pub const LOCAL_URL_PREFIX: &str = "/uploads/";

/// UploadError
///
/// Failures of the upload backend. Validation variants are reported before any strategy
/// runs; the remaining ones come from the strategy itself and keep their cause.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No se proporcionó archivo")]
    MissingFile,

    #[error("Tipo de archivo no permitido: {filename}")]
    UnsupportedExtension { filename: String },

    #[error("Ruta de archivo inválida: {0}")]
    InvalidPath(String),

    #[error("Servicio de medios no configurado: falta {0}")]
    NotConfigured(&'static str),

    #[error("Error de almacenamiento local: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error del servicio de medios: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Transport(err.to_string())
    }
}

/// UploadFile
///
/// A raw payload as received from a multipart field.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Lowercased suffix after the last dot, if the name has one.
pub fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

pub fn media_kind(filename: &str) -> Option<MediaKind> {
    let ext = extension_of(filename)?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

pub fn is_allowed(filename: &str) -> bool {
    media_kind(filename).is_some()
}

/// validate_upload
///
/// Allow-list check shared by every strategy. Runs before any byte is stored.
pub fn validate_upload(file: &UploadFile) -> Result<MediaKind, UploadError> {
    if file.filename.trim().is_empty() {
        return Err(UploadError::MissingFile);
    }
    media_kind(&file.filename).ok_or_else(|| UploadError::UnsupportedExtension {
        filename: file.filename.clone(),
    })
}

/// secure_filename
///
/// Reduces a client-supplied name to `[A-Za-z0-9._-]`, turning path separators and
/// whitespace into underscores and stripping leading/trailing dots and underscores.
pub fn secure_filename(name: &str) -> String {
    let spaced = name.replace(['/', '\\'], " ");
    let cleaned = sanitize_filename::sanitize(spaced);
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Sanitizes each segment of a destination folder; empty results are rejected.
pub fn sanitize_folder(folder: &str) -> Result<String, UploadError> {
    let segments: Vec<String> = folder
        .split(['/', '\\'])
        .map(secure_filename)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(UploadError::InvalidPath(folder.to_string()));
    }
    Ok(segments.join("/"))
}

/// unique_suffix
///
/// Current unix time in seconds plus a random tail, so that two uploads of the same
/// name within one second still get distinct names.
pub fn unique_suffix() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp(), &random[..8])
}

/// Builds `<sanitized-stem>_<suffix>.<ext>` from a validated filename.
pub fn unique_filename(filename: &str) -> String {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext.to_ascii_lowercase()),
        None => (filename, String::new()),
    };
    let mut stem = secure_filename(stem);
    if stem.is_empty() {
        stem = "archivo".to_string();
    }
    let ext = secure_filename(&ext);
    if ext.is_empty() {
        format!("{}_{}", stem, unique_suffix())
    } else {
        format!("{}_{}.{}", stem, unique_suffix(), ext)
    }
}

// 1. Results

/// MediaMetadata
///
/// Strategy-specific details returned next to the stable URL.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(untagged)]
pub enum MediaMetadata {
    Local {
        filename: String,
        path: String,
    },
    Cdn {
        public_id: String,
        width: Option<u32>,
        height: Option<u32>,
    },
}

/// StoredMedia
///
/// Outcome of a successful `store`. `public_id` is the opaque handle `remove` accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub url: String,
    pub secure_url: String,
    pub public_id: String,
    pub resource_type: String,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub metadata: MediaMetadata,
}

/// RemovalOutcome
///
/// Removing something that is already gone is reported, not treated as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    Removed,
    Missing,
}

// 2. MediaStore Contract

/// MediaStore
///
/// One upload strategy. The concrete implementation is chosen once at startup from
/// `UPLOAD_METHOD` and injected; handlers never branch on the strategy.
#[async_trait]
pub trait MediaStore: Send + Sync {
    fn kind(&self) -> UploadStrategyKind;

    /// Persists an already validated payload under `folder`.
    async fn store(&self, file: UploadFile, folder: &str) -> Result<StoredMedia, UploadError>;

    /// Deletes a previously stored asset by its opaque handle.
    async fn remove(
        &self,
        public_id: &str,
        resource_type: Option<&str>,
    ) -> Result<RemovalOutcome, UploadError>;
}

pub type MediaStoreState = Arc<dyn MediaStore>;

// 3. Local Filesystem Strategy

/// LocalStorage
///
/// Writes uploads below `root`, which is also served at `/uploads`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a relative key such as `galeria/foto_1.png` to a path under the root,
    /// refusing anything that could escape it.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, UploadError> {
        let relative = relative.trim_start_matches('/');
        let candidate = Path::new(relative);
        let escapes = candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if relative.is_empty() || escapes {
            return Err(UploadError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(candidate))
    }

    /// remove_url
    ///
    /// Inverse of `store` for a URL it produced (`/uploads/<folder>/<name>`).
    pub async fn remove_url(&self, url: &str) -> Result<RemovalOutcome, UploadError> {
        let relative = url
            .strip_prefix(LOCAL_URL_PREFIX)
            .ok_or_else(|| UploadError::InvalidPath(url.to_string()))?;
        self.remove_relative(relative).await
    }

    async fn remove_relative(&self, relative: &str) -> Result<RemovalOutcome, UploadError> {
        let path = self.resolve(relative)?;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(RemovalOutcome::Missing);
        }
        tokio::fs::remove_file(&path).await?;
        tracing::debug!(path = %path.display(), "removed local upload");
        Ok(RemovalOutcome::Removed)
    }
}

#[async_trait]
impl MediaStore for LocalStorage {
    fn kind(&self) -> UploadStrategyKind {
        UploadStrategyKind::Local
    }

    async fn store(&self, file: UploadFile, folder: &str) -> Result<StoredMedia, UploadError> {
        let folder = sanitize_folder(folder)?;
        let filename = unique_filename(&file.filename);

        let dir = self.resolve(&folder)?;
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&filename);
        tokio::fs::write(&path, &file.bytes).await?;

        let url = format!("{}{}/{}", LOCAL_URL_PREFIX, folder, filename);
        tracing::info!(%url, bytes = file.bytes.len(), "stored upload on local disk");

        Ok(StoredMedia {
            secure_url: url.clone(),
            url,
            public_id: format!("{}/{}", folder, filename),
            resource_type: media_kind(&file.filename)
                .map(|k| k.as_str())
                .unwrap_or("raw")
                .to_string(),
            format: extension_of(&file.filename),
            width: None,
            height: None,
            metadata: MediaMetadata::Local {
                filename,
                path: path.display().to_string(),
            },
        })
    }

    async fn remove(
        &self,
        public_id: &str,
        _resource_type: Option<&str>,
    ) -> Result<RemovalOutcome, UploadError> {
        self.remove_relative(public_id).await
    }
}

// 4. External CDN Strategy

/// Incoming transformation asking the CDN for automatic quality and format.
const CDN_TRANSFORMATION: &str = "q_auto/f_auto";

#[derive(Debug, Deserialize)]
struct CdnUploadResponse {
    #[serde(default)]
    url: String,
    #[serde(default)]
    secure_url: String,
    public_id: String,
    #[serde(default)]
    resource_type: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CdnDestroyResponse {
    result: String,
}

/// CloudinaryStorage
///
/// Forwards uploads to the Cloudinary REST API with signed requests. Credentials are
/// read from `CdnConfig` on every call, so a missing value only fails the request that
/// needs it.
#[derive(Clone)]
pub struct CloudinaryStorage {
    client: reqwest::Client,
    config: CdnConfig,
}

struct CdnCredentials<'a> {
    cloud_name: &'a str,
    api_key: &'a str,
    api_secret: &'a str,
}

impl CloudinaryStorage {
    pub fn new(config: CdnConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn credentials(&self) -> Result<CdnCredentials<'_>, UploadError> {
        let cloud_name = self
            .config
            .cloud_name
            .as_deref()
            .ok_or(UploadError::NotConfigured("CLOUDINARY_CLOUD_NAME"))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(UploadError::NotConfigured("CLOUDINARY_API_KEY"))?;
        let api_secret = self
            .config
            .api_secret
            .as_deref()
            .ok_or(UploadError::NotConfigured("CLOUDINARY_API_SECRET"))?;
        Ok(CdnCredentials {
            cloud_name,
            api_key,
            api_secret,
        })
    }

    /// Destination folder on the CDN: the configured root followed by `folder`.
    pub fn cdn_folder(&self, folder: &str) -> Result<String, UploadError> {
        let folder = sanitize_folder(folder)?;
        let root = self.config.root_folder.trim_matches('/');
        if root.is_empty() || folder == root || folder.starts_with(&format!("{}/", root)) {
            Ok(folder)
        } else {
            Ok(format!("{}/{}", root, folder))
        }
    }

    fn endpoint(&self, cloud_name: &str, resource_type: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            cloud_name,
            resource_type,
            action
        )
    }
}

/// sign_params
///
/// Cloudinary request signature: parameters sorted by name, joined as `k=v` with `&`,
/// followed by the API secret, hashed with SHA-1 and hex encoded.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaStore for CloudinaryStorage {
    fn kind(&self) -> UploadStrategyKind {
        UploadStrategyKind::Cloudinary
    }

    async fn store(&self, file: UploadFile, folder: &str) -> Result<StoredMedia, UploadError> {
        let creds = self.credentials()?;
        let folder = self.cdn_folder(folder)?;
        let timestamp = Utc::now().timestamp().to_string();

        let signature = sign_params(
            &[
                ("folder", folder.as_str()),
                ("timestamp", timestamp.as_str()),
                ("transformation", CDN_TRANSFORMATION),
            ],
            creds.api_secret,
        );

        let file_part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.filename.clone());
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("api_key", creds.api_key.to_string())
            .text("timestamp", timestamp)
            .text("folder", folder.clone())
            .text("transformation", CDN_TRANSFORMATION)
            .text("signature", signature);

        // "auto" lets the service decide between image and video.
        let response = self
            .client
            .post(self.endpoint(creds.cloud_name, "auto", "upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Transport(format!("{}: {}", status, body)));
        }

        let uploaded: CdnUploadResponse = response.json().await?;
        let resource_type = uploaded
            .resource_type
            .unwrap_or_else(|| "image".to_string());
        let (width, height) = if resource_type == "image" {
            (uploaded.width, uploaded.height)
        } else {
            (None, None)
        };

        tracing::info!(public_id = %uploaded.public_id, %resource_type, %folder, "stored upload on CDN");

        Ok(StoredMedia {
            url: uploaded.url,
            secure_url: uploaded.secure_url,
            public_id: uploaded.public_id.clone(),
            resource_type,
            format: uploaded.format,
            width,
            height,
            metadata: MediaMetadata::Cdn {
                public_id: uploaded.public_id,
                width,
                height,
            },
        })
    }

    async fn remove(
        &self,
        public_id: &str,
        resource_type: Option<&str>,
    ) -> Result<RemovalOutcome, UploadError> {
        let creds = self.credentials()?;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            creds.api_secret,
        );

        let response = self
            .client
            .post(self.endpoint(
                creds.cloud_name,
                resource_type.unwrap_or("image"),
                "destroy",
            ))
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", creds.api_key),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Transport(format!("{}: {}", status, body)));
        }

        let destroyed: CdnDestroyResponse = response.json().await?;
        match destroyed.result.as_str() {
            "ok" => Ok(RemovalOutcome::Removed),
            "not found" => Ok(RemovalOutcome::Missing),
            other => Err(UploadError::Transport(format!("destroy returned {}", other))),
        }
    }
}

// 5. The Upload Backend

/// UploadBackend
///
/// Validation in front of the configured strategy, plus direct access to the local
/// store for files that were written to disk (served statically and removed when their
/// gallery entry goes away, whatever the current strategy is).
#[derive(Clone)]
pub struct UploadBackend {
    strategy: MediaStoreState,
    local: LocalStorage,
}

impl UploadBackend {
    pub fn new(strategy: MediaStoreState, local: LocalStorage) -> Self {
        Self { strategy, local }
    }

    /// Picks the strategy named by `UPLOAD_METHOD`. Called once at startup.
    pub fn from_config(config: &AppConfig) -> Self {
        let local = LocalStorage::new(config.uploads_dir.clone());
        let strategy: MediaStoreState = match config.upload_strategy {
            UploadStrategyKind::Local => Arc::new(local.clone()),
            UploadStrategyKind::Cloudinary => Arc::new(CloudinaryStorage::new(config.cdn.clone())),
        };
        Self { strategy, local }
    }

    /// Local strategy rooted at `root`, used for both roles.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let local = LocalStorage::new(root);
        Self {
            strategy: Arc::new(local.clone()),
            local,
        }
    }

    pub fn method(&self) -> &'static str {
        self.strategy.kind().as_str()
    }

    pub fn local_store(&self) -> &LocalStorage {
        &self.local
    }

    pub async fn store(&self, file: UploadFile, folder: &str) -> Result<StoredMedia, UploadError> {
        validate_upload(&file)?;
        self.strategy.store(file, folder).await
    }

    pub async fn remove(
        &self,
        public_id: &str,
        resource_type: Option<&str>,
    ) -> Result<RemovalOutcome, UploadError> {
        self.strategy.remove(public_id, resource_type).await
    }

    /// Deletes the file behind a locally produced URL. Any other URL is left alone.
    pub async fn remove_if_local(&self, url: &str) -> Result<Option<RemovalOutcome>, UploadError> {
        if !url.starts_with(LOCAL_URL_PREFIX) {
            return Ok(None);
        }
        self.local.remove_url(url).await.map(Some)
    }
}

// 6. The Mock Implementation (For Tests)

/// MockMediaStore
///
/// CDN-shaped stand-in that never touches the network or the disk.
#[derive(Clone, Default)]
pub struct MockMediaStore {
    /// When true, all operations return a simulated transport failure.
    pub should_fail: bool,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    fn kind(&self) -> UploadStrategyKind {
        UploadStrategyKind::Cloudinary
    }

    async fn store(&self, file: UploadFile, folder: &str) -> Result<StoredMedia, UploadError> {
        if self.should_fail {
            return Err(UploadError::Transport(
                "Mock media error: simulation requested".to_string(),
            ));
        }
        let folder = sanitize_folder(folder)?;
        let public_id = format!("{}/{}", folder, secure_filename(&file.filename));
        let url = format!("http://cdn.mock/{}", public_id);
        Ok(StoredMedia {
            secure_url: url.replacen("http://", "https://", 1),
            url,
            public_id: public_id.clone(),
            resource_type: media_kind(&file.filename)
                .map(|k| k.as_str())
                .unwrap_or("raw")
                .to_string(),
            format: extension_of(&file.filename),
            width: Some(640),
            height: Some(480),
            metadata: MediaMetadata::Cdn {
                public_id,
                width: Some(640),
                height: Some(480),
            },
        })
    }

    async fn remove(
        &self,
        _public_id: &str,
        _resource_type: Option<&str>,
    ) -> Result<RemovalOutcome, UploadError> {
        if self.should_fail {
            return Err(UploadError::Transport(
                "Mock media error: simulation requested".to_string(),
            ));
        }
        Ok(RemovalOutcome::Removed)
    }
}
