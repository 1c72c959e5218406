//! Archive extraction to a destination directory.
//!
//! [`ArchiveExtractor`] walks an archive's file list in order, recreates its
//! directory tree under a destination root and streams every file entry to
//! disk through one reusable buffer, reporting per-entry progress to an
//! optional [`ProgressSink`].

mod paths;
mod progress;

pub use paths::entry_destination;
use progress::entry_percentage;
pub use progress::{
    ChannelProgress, ExtractionProgress, NoProgress, ProgressCallback, ProgressEvent, ProgressSink,
};

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result};
use crate::io::{LocalFileReader, ReadAt};
use crate::zip::{CompressionMethod, ZipArchive, ZipEntry};

/// Default chunk size for streaming entries to disk (256 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 0x40000;

/// Size of the compressed-input scratch buffer used for DEFLATE entries.
const INFLATE_INPUT_SIZE: usize = 64 * 1024;

/// What to do when a single entry cannot be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure, record it in the summary and carry on.
    #[default]
    BestEffort,
    /// Stop at the first failure and return it.
    Abort,
}

/// Extraction settings.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Chunk size used when streaming an entry to disk.
    pub buffer_size: usize,
    pub failure_policy: FailurePolicy,
    /// Compare each file's CRC-32 with the archive's after writing it.
    pub verify_crc: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            failure_policy: FailurePolicy::BestEffort,
            verify_crc: true,
        }
    }
}

impl ExtractOptions {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_verify_crc(mut self, verify_crc: bool) -> Self {
        self.verify_crc = verify_crc;
        self
    }
}

/// An entry that could not be extracted under [`FailurePolicy::BestEffort`].
#[derive(Debug)]
pub struct EntryFailure {
    /// Position in the file list; `None` for the destination root itself.
    pub index: Option<usize>,
    pub name: String,
    pub error: ExtractError,
}

/// Outcome of an extraction.
#[derive(Debug, Default)]
pub struct ExtractSummary {
    /// Entries in the archive's file list.
    pub total_entries: usize,
    /// Sum of the declared uncompressed sizes.
    pub total_bytes: u64,
    /// Bytes written across all entries.
    pub bytes_written: u64,
    pub files_written: usize,
    pub directories_created: usize,
    pub failures: Vec<EntryFailure>,
}

impl ExtractSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extracts ZIP archives, reusing its scratch buffers across entries and
/// across calls.
pub struct ArchiveExtractor {
    options: ExtractOptions,
    chunk: Vec<u8>,
    inflate_input: Vec<u8>,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

impl ArchiveExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        let chunk = vec![0u8; options.buffer_size.max(1)];
        Self {
            options,
            chunk,
            inflate_input: vec![0u8; INFLATE_INPUT_SIZE],
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract the archive at `archive` into `dest`.
    ///
    /// `dest` is created first, so it may exist even when the archive then
    /// fails to open.
    pub async fn extract(
        &mut self,
        archive: &Path,
        dest: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<ExtractSummary> {
        let mut summary = ExtractSummary::default();
        self.prepare_destination(dest, &mut summary).await?;

        let reader = LocalFileReader::new(archive).map_err(|source| ExtractError::Open {
            path: archive.to_path_buf(),
            source,
        })?;
        let zip = ZipArchive::open(reader)
            .await
            .map_err(|source| ExtractError::Open {
                path: archive.to_path_buf(),
                source,
            })?;

        self.extract_entries(&zip, dest, progress, summary).await
    }

    /// Extract an archive read from any [`ReadAt`] source.
    pub async fn extract_from<R: ReadAt>(
        &mut self,
        reader: R,
        dest: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<ExtractSummary> {
        let mut summary = ExtractSummary::default();
        self.prepare_destination(dest, &mut summary).await?;

        let zip = ZipArchive::open(reader)
            .await
            .map_err(|source| ExtractError::Open {
                path: "<reader>".into(),
                source,
            })?;

        self.extract_entries(&zip, dest, progress, summary).await
    }

    /// Blocking form of [`extract`](Self::extract), driven on a private
    /// current-thread runtime. Must not be called from within a runtime.
    pub fn extract_blocking(
        &mut self,
        archive: &Path,
        dest: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<ExtractSummary> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExtractError::Runtime)?;
        runtime.block_on(self.extract(archive, dest, progress))
    }

    async fn prepare_destination(&self, dest: &Path, summary: &mut ExtractSummary) -> Result<()> {
        if let Err(source) = fs::create_dir_all(dest).await {
            let error = ExtractError::Destination {
                path: dest.to_path_buf(),
                source,
            };
            self.handle_failure(summary, None, dest.display().to_string(), error)?;
        }
        Ok(())
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(dest = %dest.display(), entries = zip.len())
    )]
    async fn extract_entries<R: ReadAt>(
        &mut self,
        zip: &ZipArchive<R>,
        dest: &Path,
        mut progress: Option<&mut (dyn ProgressSink + '_)>,
        mut summary: ExtractSummary,
    ) -> Result<ExtractSummary> {
        let total = zip.len();
        summary.total_entries = total;
        summary.total_bytes = zip.total_size();
        info!(total, total_bytes = summary.total_bytes, "extracting archive");

        for (index, entry) in zip.entries().iter().enumerate() {
            let outcome = if entry.is_directory {
                self.extract_directory(entry, dest).await.map(|()| {
                    summary.directories_created += 1;
                })
            } else {
                let sink = progress.as_deref_mut();
                self.extract_file(zip, entry, index, total, dest, sink)
                    .await
                    .map(|written| {
                        summary.bytes_written += written;
                        summary.files_written += 1;
                    })
            };

            if let Err(error) = outcome {
                self.handle_failure(&mut summary, Some(index), entry.name.clone(), error)?;
            }
        }

        info!(
            files = summary.files_written,
            directories = summary.directories_created,
            bytes = summary.bytes_written,
            failures = summary.failures.len(),
            "extraction finished"
        );
        Ok(summary)
    }

    fn handle_failure(
        &self,
        summary: &mut ExtractSummary,
        index: Option<usize>,
        name: String,
        error: ExtractError,
    ) -> Result<()> {
        if error.is_fatal() || self.options.failure_policy == FailurePolicy::Abort {
            return Err(error);
        }
        warn!(entry = %name, "{error}");
        summary.failures.push(EntryFailure { index, name, error });
        Ok(())
    }

    async fn extract_directory(&self, entry: &ZipEntry, dest: &Path) -> Result<()> {
        let path = entry_destination(dest, entry)?;
        debug!(path = %path.display(), "creating directory");
        fs::create_dir_all(&path)
            .await
            .map_err(|source| ExtractError::CreateDir { path, source })
    }

    /// Stream one file entry to disk, returning the bytes written.
    async fn extract_file<R: ReadAt>(
        &mut self,
        zip: &ZipArchive<R>,
        entry: &ZipEntry,
        index: usize,
        total: usize,
        dest: &Path,
        mut progress: Option<&mut (dyn ProgressSink + '_)>,
    ) -> Result<u64> {
        let path = entry_destination(dest, entry)?;
        if entry.is_encrypted() {
            return Err(ExtractError::Unsupported {
                entry: entry.name.clone(),
                reason: "encrypted entries are not supported".to_string(),
            });
        }
        if let CompressionMethod::Unknown(code) = entry.compression {
            return Err(ExtractError::Unsupported {
                entry: entry.name.clone(),
                reason: format!("compression method {code}"),
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| ExtractError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let read_error = |source: anyhow::Error| ExtractError::Read {
            entry: entry.name.clone(),
            source,
        };
        let mut reader = zip
            .entry_reader(entry, &mut self.inflate_input)
            .await
            .map_err(read_error)?;

        let write_error = |source: std::io::Error| ExtractError::Write {
            path: path.clone(),
            source,
        };
        let mut out = fs::File::create(&path).await.map_err(write_error)?;
        debug!(path = %path.display(), size = entry.uncompressed_size, "writing file");

        if let Some(sink) = progress.as_deref_mut() {
            sink.on_entry_start(entry.display_name(), index, total);
        }

        let size = entry.uncompressed_size;
        loop {
            let n = reader
                .read_chunk(&mut self.chunk)
                .await
                .map_err(read_error)?;
            if n == 0 {
                break;
            }
            out.write_all(&self.chunk[..n]).await.map_err(write_error)?;

            if size > 0 {
                if let Some(sink) = progress.as_deref_mut() {
                    sink.on_entry_progress(entry_percentage(reader.produced(), size));
                }
            }
        }
        out.flush().await.map_err(write_error)?;
        drop(out);

        if self.options.verify_crc {
            reader.verify_crc().map_err(read_error)?;
        }
        Ok(reader.produced())
    }
}

/// Extract `archive` into `dest` with default options.
///
/// Returns `false` only when the archive cannot be opened or parsed; failures
/// of individual entries are logged and skipped.
pub async fn unzip_archive(
    archive: &Path,
    progress: Option<&mut dyn ProgressSink>,
    dest: &Path,
) -> bool {
    let mut extractor = ArchiveExtractor::default();
    match extractor.extract(archive, dest, progress).await {
        Ok(summary) => {
            if !summary.is_complete() {
                warn!(
                    failures = summary.failures.len(),
                    "archive extracted with failures"
                );
            }
            true
        }
        Err(error) => {
            warn!("{error}");
            false
        }
    }
}
