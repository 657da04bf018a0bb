//! On-disk layout of stored assets and the filesystem seam.
//!
//! Every asset root holds three sibling directories that share one
//! filename per asset:
//!
//! ```text
//! <root>/
//! ├── original/<name>   # working copy, rewritten by manipulate
//! ├── pristine/<name>   # byte-identical upload, written once
//! └── thumb/<name>      # derived thumbnail
//! ```
//!
//! File operations used by ingestion and the asset lifecycle go through
//! [`AssetFs`] so failure paths (a pristine copy that fails once, a
//! directory that cannot be created) can be exercised in tests.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

pub const ORIGINAL_DIR: &str = "original";
pub const PRISTINE_DIR: &str = "pristine";
pub const THUMB_DIR: &str = "thumb";

/// Filesystem operations the pipeline performs.
pub trait AssetFs: Sync {
    /// Recursive and idempotent; succeeds if the directory already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    /// Make `dir` group-writable so a retried write can succeed.
    fn relax_permissions(&self, dir: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl AssetFs for LocalFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(path, bytes)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::copy(from, to).map(|_| ())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    #[cfg(unix)]
    fn relax_permissions(&self, dir: &Path) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o775))
    }

    #[cfg(not(unix))]
    fn relax_permissions(&self, dir: &Path) -> io::Result<()> {
        let mut perms = std::fs::metadata(dir)?.permissions();
        perms.set_readonly(false);
        std::fs::set_permissions(dir, perms)
    }
}

/// Paths of the three copies of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    pub filename: String,
    pub working_path: PathBuf,
    pub pristine_path: PathBuf,
    pub thumbnail_path: PathBuf,
}

impl StoredAsset {
    /// All three paths, working copy first.
    pub fn paths(&self) -> [&Path; 3] {
        [
            self.working_path.as_path(),
            self.thumbnail_path.as_path(),
            self.pristine_path.as_path(),
        ]
    }

    /// Keyframe thumbnail of a video asset. The extractor picks its encoder
    /// from the extension, so the video's own name gets `.jpg` appended.
    pub fn poster_path(&self) -> PathBuf {
        let mut name = self.thumbnail_path.as_os_str().to_owned();
        name.push(".jpg");
        PathBuf::from(name)
    }
}

/// An asset root and its three subdirectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn original_dir(&self) -> PathBuf {
        self.root.join(ORIGINAL_DIR)
    }

    pub fn pristine_dir(&self) -> PathBuf {
        self.root.join(PRISTINE_DIR)
    }

    pub fn thumb_dir(&self) -> PathBuf {
        self.root.join(THUMB_DIR)
    }

    /// Directories ingestion must create, in creation order.
    pub fn directories(&self) -> [PathBuf; 3] {
        [self.original_dir(), self.thumb_dir(), self.pristine_dir()]
    }

    /// Resolve the three paths for `filename`.
    ///
    /// Only the final component of `filename` is used, so a caller-supplied
    /// name cannot escape the asset root.
    pub fn asset(&self, filename: &str) -> StoredAsset {
        let filename = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        StoredAsset {
            working_path: self.original_dir().join(&filename),
            pristine_path: self.pristine_dir().join(&filename),
            thumbnail_path: self.thumb_dir().join(&filename),
            filename,
        }
    }

    /// True if any of the three copies of `filename` exists.
    pub fn is_taken(&self, fs: &impl AssetFs, filename: &str) -> bool {
        self.asset(filename).paths().iter().any(|p| fs.exists(p))
    }
}
