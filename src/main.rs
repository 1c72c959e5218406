//! Main entry point for the zipdrop CLI application.
//!
//! Lists or extracts a local ZIP archive, printing per-entry progress to the
//! terminal while extracting.

use anyhow::{Result, bail};
use clap::Parser;
use std::io::Write;
use std::path::Path;

use zipdrop::{
    ArchiveExtractor, Cli, ExtractSummary, LocalFileReader, ProgressSink, ZipArchive, ZipEntry,
    find_entries,
};

/// Application entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp(None)
        .init();

    if cli.is_listing() {
        let reader = LocalFileReader::new(Path::new(&cli.file))?;
        let archive = ZipArchive::open(reader).await?;
        return list_files(&archive, &cli);
    }

    extract(&cli).await
}

/// Extract the whole archive into the destination directory.
async fn extract(cli: &Cli) -> Result<()> {
    let mut extractor = ArchiveExtractor::new(cli.extract_options());
    let mut console = ConsoleProgress::new(std::io::stderr());
    let console = (!cli.is_quiet()).then_some(&mut console);

    let summary = run_extraction(
        &mut extractor,
        Path::new(&cli.file),
        Path::new(cli.destination()),
        console,
    )
    .await?;

    if !cli.is_very_quiet() {
        eprintln!(
            "{} files, {} directories, {} written",
            summary.files_written,
            summary.directories_created,
            format_size(summary.bytes_written)
        );
    }

    if !summary.is_complete() {
        for failure in &summary.failures {
            eprintln!("  failed: {}: {}", failure.name, failure.error);
        }
        bail!("{} entries could not be extracted", summary.failures.len());
    }

    Ok(())
}

/// Run the extraction, ending any open progress line whether it succeeds or not.
async fn run_extraction<W: Write + Send>(
    extractor: &mut ArchiveExtractor,
    archive: &Path,
    dest: &Path,
    console: Option<&mut ConsoleProgress<W>>,
) -> zipdrop::Result<ExtractSummary> {
    let Some(console) = console else {
        return extractor.extract(archive, dest, None).await;
    };
    let sink: &mut dyn ProgressSink = &mut *console;
    let result = extractor.extract(archive, dest, Some(sink)).await;
    console.finish_line();
    result
}

/// Prints one line per file, rewritten in place as its percentage grows.
struct ConsoleProgress<W: Write> {
    out: W,
    name: String,
    open_line: bool,
}

impl<W: Write> ConsoleProgress<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            name: String::new(),
            open_line: false,
        }
    }

    fn finish_line(&mut self) {
        if self.open_line {
            let _ = writeln!(self.out);
            self.open_line = false;
        }
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgress<W> {
    fn on_entry_start(&mut self, name: &str, index: usize, total: usize) {
        self.finish_line();
        self.name = format!("[{}/{}] {}", index + 1, total, name);
        let _ = write!(self.out, "  extracting: {}", self.name);
        self.open_line = true;
    }

    fn on_entry_progress(&mut self, percentage: u8) {
        let _ = write!(self.out, "\r  extracting: {} {:>3}%", self.name, percentage);
        let _ = self.out.flush();
    }
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
///
/// `--ext` and `--depth` restrict the listing to matching files.
fn list_files<R: zipdrop::ReadAt>(archive: &ZipArchive<R>, cli: &Cli) -> Result<()> {
    let filtered = !cli.extensions.is_empty() || cli.depth.is_some();
    let entries: Vec<&ZipEntry> = if filtered {
        let extensions: Vec<&str> = cli.extensions.iter().map(String::as_str).collect();
        find_entries(archive.entries(), &extensions, cli.depth.unwrap_or(usize::MAX))
            .into_iter()
            .map(|i| &archive.entries()[i])
            .collect()
    } else {
        archive.entries().iter().collect()
    };

    if !cli.verbose {
        for entry in &entries {
            println!("{}", entry.name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );

    Ok(())
}

/// Space saved by compression, as a right-aligned percentage.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 || compressed >= uncompressed {
        return "  0%".to_string();
    }
    format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
