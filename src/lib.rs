//! # zipdrop
//!
//! Streaming ZIP extraction with per-entry progress reporting.
//!
//! An archive is read through the [`ReadAt`] trait, its central directory is
//! parsed into a [`ZipArchive`], and an [`ArchiveExtractor`] recreates the
//! archive's tree under a destination directory, writing every file through
//! one reusable buffer and notifying a [`ProgressSink`] after each chunk.
//!
//! ## Features
//!
//! - STORED and DEFLATE entries, ZIP64 archives
//! - Per-entry progress through a callback record, a channel or a custom sink
//! - CRC-32 verification and refusal of entries escaping the destination
//! - Best-effort or abort-on-first-failure handling of broken entries
//! - Extension/depth filtering of an archive's file list
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use zipdrop::{ExtractionProgress, ProgressCallback, unzip_archive};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut progress = ProgressCallback::new(|p: &ExtractionProgress| {
//!         println!("[{}/{}] {} {}%", p.current + 1, p.total, p.filename, p.percentage);
//!     });
//!
//!     let archive = Path::new("assets.zip");
//!     let ok = unzip_archive(archive, Some(&mut progress), Path::new("assets")).await;
//!     assert!(ok);
//! }
//! ```

pub mod cli;
pub mod error;
pub mod extract;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{ExtractError, Result};
pub use extract::{
    ArchiveExtractor, ChannelProgress, EntryFailure, ExtractOptions, ExtractSummary,
    ExtractionProgress, FailurePolicy, NoProgress, ProgressCallback, ProgressEvent, ProgressSink,
    unzip_archive,
};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use zip::{ArchiveSet, ZipArchive, ZipEntry, find_entries};
