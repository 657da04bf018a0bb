//! # Gallery Media
//!
//! The media core of a self-hosted photo and video gallery: a raster
//! transform engine, an upload ingestion pipeline, and a video keyframe
//! extractor. Authentication, sharing and page rendering live elsewhere and
//! call into this crate.
//!
//! # Architecture: Three Copies Per Asset
//!
//! Every upload is stored three times under one asset root, with the same
//! filename in each directory:
//!
//! ```text
//! original/   working copy: every manipulate overwrites it
//! pristine/   the upload as received: never modified, used by revert
//! thumb/      derived thumbnail: regenerated whenever the working copy changes
//! ```
//!
//! The flow is:
//!
//! ```text
//! upload ──► ingest ──► original/ + pristine/ + thumb/
//!                          │
//!            manipulate ◄──┤  (one Operation, re-encode, new thumbnail)
//!            revert     ◄──┘  (pristine/ → original/, new thumbnail)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | `RasterImage`, the transform/filter engine, and the `ImageBackend` seam |
//! | [`ingest`] | Upload validation, three-copy persistence, rollback on failure |
//! | [`assets`] | Manipulate, revert, delete, and parallel thumbnail rebuilds |
//! | [`video`] | ffmpeg detection, probing, and keyframe extraction |
//! | [`storage`] | Asset root layout and the `AssetFs` filesystem seam |
//! | [`naming`] | Sanitized, collision-free destination filenames |
//! | [`config`] | `gallery-media.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## No Partial Mutation
//!
//! Every transform builds its result in a fresh canvas and swaps it in only
//! when done, so a failing operation leaves the image exactly as it was. The
//! backend writes files through a sibling temp file and a rename for the
//! same reason.
//!
//! ## Transparency Through One Constructor
//!
//! Destination buffers are only ever created by one constructor that takes
//! the source format. PNG and GIF canvases start transparent and are copied
//! into without blending; everything else starts opaque. A new operation
//! cannot forget the rule because there is no other way to get a buffer.
//!
//! ## Video Is Best Effort
//!
//! ffmpeg is an optional host dependency. When it is missing or fails, probes
//! return `None` and keyframe extraction returns `false`; a video upload still
//! succeeds and the caller shows a placeholder.
//!
//! ## Seams for Testing
//!
//! Image work goes through [`imaging::ImageBackend`], file work through
//! [`storage::AssetFs`], and child processes through [`video::CommandRunner`].
//! Tests replace each with recording fakes to exercise rollback and retry
//! paths without corrupt files or real binaries.

pub mod assets;
pub mod config;
pub mod imaging;
pub mod ingest;
pub mod naming;
pub mod output;
pub mod storage;
pub mod video;

#[cfg(test)]
pub(crate) mod test_helpers;
