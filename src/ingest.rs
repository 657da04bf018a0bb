//! Upload ingestion: validate, name, persist three copies, roll back on failure.
//!
//! ## Pipeline
//!
//! ```text
//! UploadedFile
//!   1. transport status      → Transport(..)            (nothing written)
//!   2. type + size policy    → InvalidFileType / FileTooLarge, collected
//!   3. unique destination    → stem_suffix.ext
//!   4. original/ thumb/ pristine/ exist   → DirectoryCreate
//!   5. original/<name>       → Move
//!   6. pristine/<name>       best effort: copy, relax perms, copy again, warn
//!   7. thumb/<name>          → Thumbnail, after removing 5 and 6
//!   8. re-read dimensions    → AssetMetadata
//! ```
//!
//! Errors are returned as an [`UploadErrors`] list so that a caller can show
//! every validation problem of one upload at once.
//!
//! Video uploads ([`Ingestor::ingest_video`]) share steps 1-6; the thumbnail
//! comes from the keyframe extractor and its absence is not an error.

use crate::config::{MediaConfig, UploadsConfig, VideoConfig};
use crate::imaging::{
    ImageBackend, ImagingError, Quality, ThumbnailConfig, create_thumbnail, get_dimensions,
};
use crate::naming::{split_name, unique_filename};
use crate::storage::{AssetFs, AssetLayout, StoredAsset};
use crate::video::{CommandRunner, KeyframeExtractor, VideoProbe};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure reported by whatever received the bytes before ingestion.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("the file exceeds the server's maximum upload size")]
    ExceedsMaxSize,
    #[error("the file was only partially uploaded")]
    Partial,
    #[error("no file was uploaded")]
    NoFile,
    #[error("the server has no temporary upload directory")]
    NoTmpDir,
    #[error("the upload could not be written to disk")]
    CantWrite,
    #[error("the upload was stopped by a server extension")]
    Extension,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload failed: {0}")]
    Transport(#[from] TransportError),
    #[error("File type not allowed: {mime_type} (.{extension})")]
    InvalidFileType { mime_type: String, extension: String },
    #[error("File too large: {size} bytes (limit {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },
    #[error("Cannot create directory {}: {source}", path.display())]
    DirectoryCreate { path: PathBuf, source: io::Error },
    #[error("Cannot store upload at {}: {source}", path.display())]
    Move { path: PathBuf, source: io::Error },
    #[error("Thumbnail generation failed: {0}")]
    Thumbnail(#[source] ImagingError),
    #[error("Cannot read stored image: {0}")]
    Identify(#[source] ImagingError),
}

/// One or more [`UploadError`]s from a single upload.
#[derive(Debug)]
pub struct UploadErrors(Vec<UploadError>);

impl UploadErrors {
    pub fn errors(&self) -> &[UploadError] {
        &self.0
    }

    /// Human-readable message per error, in detection order.
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(|e| e.to_string()).collect()
    }

    pub fn into_inner(self) -> Vec<UploadError> {
        self.0
    }
}

impl fmt::Display for UploadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

impl std::error::Error for UploadErrors {}

impl From<UploadError> for UploadErrors {
    fn from(e: UploadError) -> Self {
        Self(vec![e])
    }
}

/// An upload as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    /// Client-side file name; only its stem survives into the stored name.
    pub original_name: String,
    pub mime_type: String,
    /// Declared extension, without the dot.
    pub extension: String,
    /// Declared size in bytes.
    pub size: u64,
    pub transport_error: Option<TransportError>,
}

impl UploadedFile {
    /// An upload that arrived intact; extension and size are derived from
    /// the name and the bytes.
    pub fn new(original_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let original_name = original_name.into();
        let extension = split_name(&original_name).1.to_string();
        Self {
            size: bytes.len() as u64,
            bytes,
            original_name,
            mime_type: mime_type.into(),
            extension,
            transport_error: None,
        }
    }

    pub fn with_transport_error(mut self, error: TransportError) -> Self {
        self.transport_error = Some(error);
        self
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.to_ascii_lowercase().starts_with("video/")
    }
}

/// Allow-lists and size limit applied before anything is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadPolicy {
    pub allowed_mime_types: Vec<String>,
    pub allowed_extensions: Vec<String>,
    /// `0` disables the size check.
    pub max_bytes: u64,
}

impl UploadPolicy {
    pub fn from_config(config: &UploadsConfig) -> Self {
        Self {
            allowed_mime_types: config.allowed_mime_types.clone(),
            allowed_extensions: config.allowed_extensions.clone(),
            max_bytes: config.max_bytes,
        }
    }

    fn mime_allowed(&self, mime: &str) -> bool {
        self.allowed_mime_types.is_empty()
            || self
                .allowed_mime_types
                .iter()
                .any(|m| m.eq_ignore_ascii_case(mime.trim()))
    }

    fn extension_allowed(&self, ext: &str) -> bool {
        let ext = ext.trim().trim_start_matches('.');
        self.allowed_extensions.is_empty()
            || self
                .allowed_extensions
                .iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Check transport status, then type and size.
    ///
    /// A transport failure is reported alone. Type and size problems are
    /// collected together. The type check passes when either the MIME type
    /// or the extension is allowed.
    pub fn validate(&self, file: &UploadedFile) -> Result<(), UploadErrors> {
        if let Some(e) = file.transport_error {
            return Err(UploadError::Transport(e).into());
        }

        let mut errors = Vec::new();
        if !(self.mime_allowed(&file.mime_type) || self.extension_allowed(&file.extension)) {
            errors.push(UploadError::InvalidFileType {
                mime_type: file.mime_type.clone(),
                extension: file.extension.clone(),
            });
        }
        if self.max_bytes > 0 && file.size > self.max_bytes {
            errors.push(UploadError::FileTooLarge {
                size: file.size,
                max: self.max_bytes,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(UploadErrors(errors))
        }
    }
}

/// Outcome of a successful image ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetMetadata {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub width: u32,
    pub height: u32,
}

/// Outcome of a successful video ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoAsset {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub probe: VideoProbe,
    /// False when no keyframe could be extracted; show a placeholder.
    pub thumbnail: bool,
}

/// MIME type conventionally used for a file extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => return None,
    };
    Some(mime)
}

/// Runs the ingestion pipeline against one asset root.
pub struct Ingestor<'a, B: ImageBackend, F: AssetFs> {
    backend: &'a B,
    fs: &'a F,
    layout: &'a AssetLayout,
    policy: UploadPolicy,
    thumbnail: ThumbnailConfig,
    video: VideoConfig,
}

impl<'a, B: ImageBackend, F: AssetFs> Ingestor<'a, B, F> {
    pub fn new(backend: &'a B, fs: &'a F, layout: &'a AssetLayout, config: &MediaConfig) -> Self {
        Self {
            backend,
            fs,
            layout,
            policy: UploadPolicy::from_config(&config.uploads),
            thumbnail: thumbnail_config(config),
            video: config.video.clone(),
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Ingest an image upload.
    pub fn ingest(&self, file: &UploadedFile) -> Result<AssetMetadata, UploadErrors> {
        let stored = self.store(file)?;

        if let Err(e) = create_thumbnail(
            self.backend,
            &stored.working_path,
            &stored.thumbnail_path,
            &self.thumbnail,
        ) {
            self.rollback(&stored, &e);
            return Err(UploadError::Thumbnail(e).into());
        }

        let (width, height) = match get_dimensions(self.backend, &stored.working_path) {
            Ok(dims) => dims,
            Err(e) => {
                self.rollback(&stored, &e);
                return Err(UploadError::Identify(e).into());
            }
        };

        info!(
            filename = %stored.filename,
            original = %file.original_name,
            width,
            height,
            "ingested image"
        );
        Ok(AssetMetadata {
            filename: stored.filename,
            original_name: file.original_name.clone(),
            mime_type: file.mime_type.clone(),
            byte_size: file.bytes.len() as u64,
            width,
            height,
        })
    }

    /// Ingest a video upload. A missing toolkit or failed extraction leaves
    /// `thumbnail: false` instead of failing.
    pub fn ingest_video<R: CommandRunner>(
        &self,
        file: &UploadedFile,
        extractor: &KeyframeExtractor<R>,
    ) -> Result<VideoAsset, UploadErrors> {
        let stored = self.store(file)?;

        let probe = extractor.probe(&stored.working_path);
        let thumbnail = extractor.extract_thumbnail(
            &stored.working_path,
            &stored.poster_path(),
            self.video.thumbnail_at,
            self.video.thumbnail_width,
            self.video.thumbnail_height,
        );
        if !thumbnail {
            warn!(filename = %stored.filename, "video stored without a keyframe thumbnail");
        }

        info!(
            filename = %stored.filename,
            original = %file.original_name,
            duration = ?probe.duration_seconds,
            thumbnail,
            "ingested video"
        );
        Ok(VideoAsset {
            filename: stored.filename,
            original_name: file.original_name.clone(),
            mime_type: file.mime_type.clone(),
            byte_size: file.bytes.len() as u64,
            probe,
            thumbnail,
        })
    }

    /// Steps 1-6: validate, name, create directories, write working and
    /// pristine copies.
    fn store(&self, file: &UploadedFile) -> Result<StoredAsset, UploadErrors> {
        self.policy.validate(file)?;

        let (stem, name_ext) = split_name(&file.original_name);
        let ext = if file.extension.is_empty() {
            name_ext
        } else {
            file.extension.as_str()
        };
        let filename = unique_filename(stem, ext, |candidate| {
            self.layout.is_taken(self.fs, candidate)
        });
        let stored = self.layout.asset(&filename);

        for dir in self.layout.directories() {
            if let Err(source) = self.fs.create_dir_all(&dir) {
                return Err(UploadError::DirectoryCreate { path: dir, source }.into());
            }
        }

        if let Err(source) = self.fs.write(&stored.working_path, &file.bytes) {
            let _ = self.fs.remove_file(&stored.working_path);
            return Err(UploadError::Move {
                path: stored.working_path,
                source,
            }
            .into());
        }

        self.write_pristine(&stored);
        Ok(stored)
    }

    fn write_pristine(&self, stored: &StoredAsset) {
        let Err(first) = self.fs.copy(&stored.working_path, &stored.pristine_path) else {
            return;
        };
        warn!(
            path = %stored.pristine_path.display(),
            error = %first,
            "pristine copy failed, relaxing permissions and retrying"
        );

        let dir = self.layout.pristine_dir();
        if let Err(e) = self.fs.relax_permissions(&dir) {
            debug!(dir = %dir.display(), error = %e, "could not relax permissions");
        }
        if let Err(second) = self.fs.copy(&stored.working_path, &stored.pristine_path) {
            warn!(
                path = %stored.pristine_path.display(),
                error = %second,
                "pristine copy failed again; asset has no revert backup"
            );
        }
    }

    /// Remove every copy written so far.
    fn rollback(&self, stored: &StoredAsset, cause: &ImagingError) {
        warn!(filename = %stored.filename, error = %cause, "rolling back ingestion");
        for path in stored.paths() {
            match self.fs.remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "rollback could not remove file"),
            }
        }
    }
}

/// Thumbnail settings shared by ingestion and the asset lifecycle.
pub fn thumbnail_config(config: &MediaConfig) -> ThumbnailConfig {
    ThumbnailConfig {
        width: config.thumbnails.width,
        height: config.thumbnails.height,
        quality: Quality::new(config.images.quality),
    }
}
