//! Lifecycle of stored assets after ingestion: manipulate, revert, delete,
//! and batch thumbnail rebuilds.
//!
//! ## Concurrency
//!
//! Nothing here locks. Two manipulations of the same asset at once race on
//! its working copy (last writer wins, and a reader may see a half-replaced
//! file on platforms without atomic rename). Callers must serialize access
//! per asset, for example with a per-filename lock or a single-writer queue.
//! Different assets in the same root are independent; that is what
//! [`AssetManager::rebuild_thumbnails`] relies on to run in parallel.

use crate::config::MediaConfig;
use crate::imaging::rust_backend::is_supported_image;
use crate::imaging::{
    Dimensions, ImageBackend, ImagingError, Operation, Quality, ThumbnailConfig, apply_operation,
    create_thumbnail, get_dimensions,
};
use crate::ingest::thumbnail_config;
use crate::storage::{AssetFs, AssetLayout, StoredAsset};
use rayon::prelude::*;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Image operation failed: {0}")]
    Imaging(#[from] ImagingError),
    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("No pristine copy of {0}; cannot revert")]
    PristineMissing(String),
    #[error("No working copy of {0}")]
    WorkingMissing(String),
    /// The working copy was written; only its thumbnail is out of date.
    #[error("{filename} was updated but its thumbnail could not be refreshed: {source}")]
    StaleThumbnail {
        filename: String,
        #[source]
        source: ImagingError,
    },
}

/// Result of a successful manipulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManipulateResult {
    pub filename: String,
    pub operation: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Which copies a delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub filename: String,
    pub removed: Vec<PathBuf>,
    /// Copies that did not exist. Not an error.
    pub missing: Vec<PathBuf>,
    /// Copies that exist but could not be removed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl DeleteReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    /// One line per copy that could not be removed.
    pub fn messages(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(path, reason)| format!("Cannot remove {}: {reason}", path.display()))
            .collect()
    }
}

/// Progress of [`AssetManager::rebuild_thumbnails`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildEvent {
    Started { total: usize },
    Rebuilt { filename: String, width: u32, height: u32 },
    Skipped { filename: String },
    Failed { filename: String, error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub rebuilt: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Operations on the stored assets of one root.
pub struct AssetManager<'a, B: ImageBackend, F: AssetFs> {
    backend: &'a B,
    fs: &'a F,
    layout: &'a AssetLayout,
    thumbnail: ThumbnailConfig,
    quality: Quality,
}

impl<'a, B: ImageBackend, F: AssetFs> AssetManager<'a, B, F> {
    pub fn new(backend: &'a B, fs: &'a F, layout: &'a AssetLayout, config: &MediaConfig) -> Self {
        Self {
            backend,
            fs,
            layout,
            thumbnail: thumbnail_config(config),
            quality: Quality::new(config.images.quality),
        }
    }

    fn existing(&self, filename: &str) -> Result<StoredAsset, AssetError> {
        let asset = self.layout.asset(filename);
        if !self.fs.exists(&asset.working_path) {
            return Err(AssetError::WorkingMissing(asset.filename));
        }
        Ok(asset)
    }

    fn refresh_thumbnail(&self, asset: &StoredAsset) -> Result<Dimensions, ImagingError> {
        create_thumbnail(
            self.backend,
            &asset.working_path,
            &asset.thumbnail_path,
            &self.thumbnail,
        )
    }

    /// Refresh after the working copy has already changed on disk.
    fn refresh_after_write(&self, asset: &StoredAsset) -> Result<(), AssetError> {
        self.refresh_thumbnail(asset).map(|_| ()).map_err(|source| {
            warn!(filename = %asset.filename, error = %source, "thumbnail is stale");
            AssetError::StaleThumbnail {
                filename: asset.filename.clone(),
                source,
            }
        })
    }

    /// Apply one operation to the working copy, then regenerate its
    /// thumbnail. The pristine copy is never touched.
    ///
    /// [`AssetError::StaleThumbnail`] means the edit is on disk and only the
    /// thumbnail failed; [`rebuild_thumbnails`](Self::rebuild_thumbnails)
    /// repairs it.
    pub fn manipulate(
        &self,
        filename: &str,
        operation: &Operation,
    ) -> Result<ManipulateResult, AssetError> {
        let asset = self.existing(filename)?;
        let dims = apply_operation(
            self.backend,
            &asset.working_path,
            operation.clone(),
            self.quality,
        )?;
        self.refresh_after_write(&asset)?;

        info!(
            filename = %asset.filename,
            operation = operation.name(),
            width = dims.width,
            height = dims.height,
            "manipulated asset"
        );
        Ok(ManipulateResult {
            filename: asset.filename,
            operation: operation.name(),
            width: dims.width,
            height: dims.height,
        })
    }

    /// Restore the working copy byte-for-byte from the pristine copy and
    /// regenerate the thumbnail.
    ///
    /// Returns the restored dimensions for images. Videos are restored
    /// without touching their poster and return `None`.
    pub fn revert(&self, filename: &str) -> Result<Option<Dimensions>, AssetError> {
        let asset = self.layout.asset(filename);
        if !self.fs.exists(&asset.pristine_path) {
            return Err(AssetError::PristineMissing(asset.filename));
        }
        self.fs
            .copy(&asset.pristine_path, &asset.working_path)
            .map_err(|source| AssetError::Io {
                path: asset.working_path.clone(),
                source,
            })?;
        if !is_supported_image(&asset.working_path) {
            info!(filename = %asset.filename, "reverted asset");
            return Ok(None);
        }
        self.refresh_after_write(&asset)?;
        let (width, height) = get_dimensions(self.backend, &asset.working_path)?;

        info!(filename = %asset.filename, width, height, "reverted asset");
        Ok(Some(Dimensions { width, height }))
    }

    /// Remove all copies of an asset. Copies that are already gone are
    /// listed as missing, not as failures.
    pub fn delete(&self, filename: &str) -> DeleteReport {
        let asset = self.layout.asset(filename);
        let mut report = DeleteReport {
            filename: asset.filename.clone(),
            ..DeleteReport::default()
        };

        for path in asset.paths() {
            match self.fs.remove_file(path) {
                Ok(()) => report.removed.push(path.to_path_buf()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    report.missing.push(path.to_path_buf())
                }
                Err(e) => report.failed.push((path.to_path_buf(), e.to_string())),
            }
        }

        let poster = asset.poster_path();
        if self.fs.exists(&poster) {
            match self.fs.remove_file(&poster) {
                Ok(()) => report.removed.push(poster),
                Err(e) => report.failed.push((poster, e.to_string())),
            }
        }

        if report.success() {
            info!(filename = %report.filename, removed = report.removed.len(), "deleted asset");
        } else {
            warn!(filename = %report.filename, failures = ?report.messages(), "delete incomplete");
        }
        report
    }

    /// Filenames of working copies, sorted.
    pub fn list(&self) -> Vec<String> {
        let dir = self.layout.original_dir();
        if !dir.is_dir() {
            return Vec::new();
        }
        let mut names: Vec<String> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| !name.ends_with(".partial"))
            .collect();
        names.sort();
        names
    }

    /// Regenerate every image thumbnail from its working copy, in parallel
    /// across assets. Non-image assets are skipped.
    pub fn rebuild_thumbnails(&self, events: Option<Sender<RebuildEvent>>) -> RebuildSummary {
        let names = self.list();
        let emit = |event: RebuildEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(event);
            }
        };
        emit(RebuildEvent::Started { total: names.len() });

        let outcomes: Vec<Outcome> = names
            .par_iter()
            .map(|name| {
                let asset = self.layout.asset(name);
                let (event, outcome) = if !is_supported_image(Path::new(name)) {
                    (
                        RebuildEvent::Skipped {
                            filename: name.clone(),
                        },
                        Outcome::Skipped,
                    )
                } else {
                    match self.refresh_thumbnail(&asset) {
                        Ok(dims) => (
                            RebuildEvent::Rebuilt {
                                filename: name.clone(),
                                width: dims.width,
                                height: dims.height,
                            },
                            Outcome::Rebuilt,
                        ),
                        Err(e) => {
                            warn!(filename = %name, error = %e, "thumbnail rebuild failed");
                            (
                                RebuildEvent::Failed {
                                    filename: name.clone(),
                                    error: e.to_string(),
                                },
                                Outcome::Failed,
                            )
                        }
                    }
                };
                emit(event);
                outcome
            })
            .collect();

        let mut summary = RebuildSummary::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Rebuilt => summary.rebuilt += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

enum Outcome {
    Rebuilt,
    Skipped,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{RasterFormat, RasterImage, RustBackend};
    use crate::ingest::{Ingestor, UploadedFile};
    use crate::storage::LocalFs;
    use crate::test_helpers::{encode_test_image, setup_layout, write_test_image};

    fn ingest_png(layout: &AssetLayout, width: u32, height: u32) -> (String, Vec<u8>) {
        let bytes = encode_test_image(RasterFormat::Png, width, height);
        let backend = RustBackend::new();
        let meta = Ingestor::new(&backend, &LocalFs, layout, &MediaConfig::default())
            .ingest(&UploadedFile::new("photo.png", "image/png", bytes.clone()))
            .unwrap();
        (meta.filename, bytes)
    }

    // =========================================================================
    // manipulate
    // =========================================================================

    #[test]
    fn manipulate_updates_working_copy_and_thumbnail() {
        let (_tmp, layout) = setup_layout();
        let (name, original) = ingest_png(&layout, 80, 40);
        let backend = RustBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let result = manager
            .manipulate(&name, &Operation::Rotate { degrees: 90.0 })
            .unwrap();

        assert_eq!((result.width, result.height), (40, 80));
        assert_eq!(result.operation, "rotate");
        let asset = layout.asset(&name);
        assert_ne!(std::fs::read(&asset.working_path).unwrap(), original);
        assert_eq!(std::fs::read(&asset.pristine_path).unwrap(), original);
        let thumb = RasterImage::load(&std::fs::read(&asset.thumbnail_path).unwrap()).unwrap();
        assert_eq!(thumb.dimensions(), (300, 300));
    }

    #[test]
    fn manipulate_missing_asset_errors() {
        let (_tmp, layout) = setup_layout();
        let backend = MockBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let err = manager.manipulate("nope.png", &Operation::Grayscale).unwrap_err();
        assert!(matches!(err, AssetError::WorkingMissing(name) if name == "nope.png"));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn manipulate_invalid_dimensions_leaves_files() {
        let (_tmp, layout) = setup_layout();
        let (name, original) = ingest_png(&layout, 30, 30);
        let backend = RustBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let err = manager
            .manipulate(
                &name,
                &Operation::Crop {
                    width: 0,
                    height: 5,
                    x: None,
                    y: None,
                },
            )
            .unwrap_err();

        assert!(matches!(
            err,
            AssetError::Imaging(ImagingError::InvalidDimensions { .. })
        ));
        assert_eq!(std::fs::read(layout.asset(&name).working_path).unwrap(), original);
    }

    #[test]
    fn manipulate_uses_configured_quality() {
        let (_tmp, layout) = setup_layout();
        std::fs::create_dir_all(layout.original_dir()).unwrap();
        write_test_image(&layout.original_dir(), "a.jpg", RasterFormat::Jpeg, 10, 10);
        let backend = MockBackend::new();
        let mut config = MediaConfig::default();
        config.images.quality = 55;
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &config);

        manager.manipulate("a.jpg", &Operation::Sharpen).unwrap();

        let ops = backend.get_operations();
        assert!(matches!(&ops[0], RecordedOp::Manipulate { quality: 55, .. }));
        assert!(matches!(&ops[1], RecordedOp::Thumbnail { quality: 55, .. }));
    }

    #[test]
    fn manipulate_reports_stale_thumbnail_after_write() {
        let (_tmp, layout) = setup_layout();
        std::fs::create_dir_all(layout.original_dir()).unwrap();
        write_test_image(&layout.original_dir(), "a.png", RasterFormat::Png, 10, 10);
        let backend = MockBackend::failing_thumbnails();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let err = manager.manipulate("a.png", &Operation::Grayscale).unwrap_err();

        assert!(matches!(&err, AssetError::StaleThumbnail { filename, .. } if filename == "a.png"));
        assert!(err.to_string().contains("was updated"));
        let ops = backend.get_operations();
        assert!(matches!(&ops[0], RecordedOp::Manipulate { .. }));
        assert!(matches!(&ops[1], RecordedOp::Thumbnail { .. }));
    }

    // =========================================================================
    // revert
    // =========================================================================

    #[test]
    fn revert_restores_original_bytes() {
        let (_tmp, layout) = setup_layout();
        let (name, original) = ingest_png(&layout, 64, 32);
        let backend = RustBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        manager.manipulate(&name, &Operation::Grayscale).unwrap();
        manager
            .manipulate(
                &name,
                &Operation::Resize {
                    width: 10,
                    height: 10,
                    maintain_aspect: false,
                },
            )
            .unwrap();
        let dims = manager.revert(&name).unwrap();

        assert_eq!(dims, Some(Dimensions { width: 64, height: 32 }));
        assert_eq!(std::fs::read(layout.asset(&name).working_path).unwrap(), original);
    }

    #[test]
    fn revert_without_pristine_errors() {
        let (_tmp, layout) = setup_layout();
        let (name, _) = ingest_png(&layout, 20, 20);
        std::fs::remove_file(layout.asset(&name).pristine_path).unwrap();
        let backend = RustBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        assert!(matches!(
            manager.revert(&name),
            Err(AssetError::PristineMissing(_))
        ));
    }

    #[test]
    fn revert_video_restores_without_thumbnail() {
        let (_tmp, layout) = setup_layout();
        for dir in layout.directories() {
            std::fs::create_dir_all(dir).unwrap();
        }
        let asset = layout.asset("clip_1.mp4");
        std::fs::write(&asset.pristine_path, b"original video").unwrap();
        std::fs::write(&asset.working_path, b"edited video").unwrap();
        let backend = MockBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        assert_eq!(manager.revert("clip_1.mp4").unwrap(), None);
        assert_eq!(std::fs::read(&asset.working_path).unwrap(), b"original video");
        assert!(backend.get_operations().is_empty());
    }

    // =========================================================================
    // delete
    // =========================================================================

    #[test]
    fn delete_removes_all_copies() {
        let (_tmp, layout) = setup_layout();
        let (name, _) = ingest_png(&layout, 20, 20);
        let backend = MockBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let report = manager.delete(&name);

        assert!(report.success());
        assert_eq!(report.removed.len(), 3);
        assert!(report.missing.is_empty());
        for path in layout.asset(&name).paths() {
            assert!(!path.exists());
        }
    }

    #[test]
    fn delete_tolerates_missing_copies() {
        let (_tmp, layout) = setup_layout();
        let (name, _) = ingest_png(&layout, 20, 20);
        std::fs::remove_file(layout.asset(&name).pristine_path).unwrap();
        let backend = MockBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let report = manager.delete(&name);

        assert!(report.success());
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.missing, vec![layout.asset(&name).pristine_path]);
    }

    #[test]
    fn delete_unknown_asset_succeeds() {
        let (_tmp, layout) = setup_layout();
        let backend = MockBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let report = manager.delete("ghost.png");
        assert!(report.success());
        assert!(report.removed.is_empty());
        assert_eq!(report.missing.len(), 3);
        assert!(report.messages().is_empty());
    }

    #[test]
    fn delete_removes_video_poster() {
        let (_tmp, layout) = setup_layout();
        for dir in layout.directories() {
            std::fs::create_dir_all(dir).unwrap();
        }
        let asset = layout.asset("clip_1.mp4");
        std::fs::write(&asset.working_path, b"v").unwrap();
        std::fs::write(asset.poster_path(), b"p").unwrap();
        let backend = MockBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let report = manager.delete("clip_1.mp4");
        assert!(report.removed.contains(&asset.poster_path()));
        assert!(!asset.poster_path().exists());
    }

    // =========================================================================
    // rebuild
    // =========================================================================

    #[test]
    fn rebuild_regenerates_every_image() {
        let (_tmp, layout) = setup_layout();
        let (a, _) = ingest_png(&layout, 40, 20);
        let (b, _) = ingest_png(&layout, 20, 40);
        std::fs::write(layout.original_dir().join("clip.mp4"), b"video").unwrap();
        std::fs::remove_file(layout.asset(&a).thumbnail_path).unwrap();

        let backend = RustBackend::new();
        let mut config = MediaConfig::default();
        config.thumbnails.width = 16;
        config.thumbnails.height = 8;
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &config);
        let (tx, rx) = std::sync::mpsc::channel();

        let summary = manager.rebuild_thumbnails(Some(tx));

        assert_eq!(
            summary,
            RebuildSummary {
                rebuilt: 2,
                skipped: 1,
                failed: 0
            }
        );
        let events: Vec<RebuildEvent> = rx.iter().collect();
        assert_eq!(events[0], RebuildEvent::Started { total: 3 });
        assert_eq!(events.len(), 4);
        for name in [&a, &b] {
            let thumb = backend.identify(&layout.asset(name).thumbnail_path).unwrap();
            assert_eq!(thumb, Dimensions { width: 16, height: 8 });
        }
    }

    #[test]
    fn rebuild_reports_failures() {
        let (_tmp, layout) = setup_layout();
        std::fs::create_dir_all(layout.original_dir()).unwrap();
        std::fs::create_dir_all(layout.thumb_dir()).unwrap();
        std::fs::write(layout.original_dir().join("bad.png"), b"garbage").unwrap();
        let backend = RustBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());

        let summary = manager.rebuild_thumbnails(None);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rebuilt, 0);
    }

    #[test]
    fn rebuild_of_empty_root_does_nothing() {
        let (_tmp, layout) = setup_layout();
        let backend = MockBackend::new();
        let manager = AssetManager::new(&backend, &LocalFs, &layout, &MediaConfig::default());
        assert_eq!(manager.rebuild_thumbnails(None), RebuildSummary::default());
        assert!(backend.get_operations().is_empty());
    }
}
