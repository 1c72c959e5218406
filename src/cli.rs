use clap::Parser;

use crate::extract::{DEFAULT_BUFFER_SIZE, ExtractOptions, FailurePolicy};

#[derive(Parser, Debug)]
#[command(name = "zipdrop")]
#[command(version)]
#[command(about = "Extract ZIP archives with per-entry progress", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipdrop data.zip -d out            extract data.zip into ./out\n  \
  zipdrop -l --ext png --depth 1 pics.zip   list top-level and first-level PNG files\n  \
  RUST_LOG=debug zipdrop data.zip    extract with debug logging")]
pub struct Cli {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Only list entries with these extensions
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Only list entries nested at most this many directories deep
    #[arg(long, value_name = "N")]
    pub depth: Option<usize>,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Stop at the first entry that fails to extract
    #[arg(long)]
    pub strict: bool,

    /// Skip CRC-32 verification
    #[arg(long = "no-crc")]
    pub no_crc: bool,

    /// Chunk size in bytes used when writing files
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_listing(&self) -> bool {
        self.list || self.verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Destination root, the current directory by default.
    pub fn destination(&self) -> &str {
        self.extract_dir.as_deref().unwrap_or(".")
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.quiet {
            0 => "info",
            1 => "warn",
            _ => "error",
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        let policy = if self.strict {
            FailurePolicy::Abort
        } else {
            FailurePolicy::BestEffort
        };
        ExtractOptions::default()
            .with_buffer_size(self.buffer_size)
            .with_failure_policy(policy)
            .with_verify_crc(!self.no_crc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_options() {
        let cli = Cli::parse_from([
            "zipdrop", "a.zip", "--strict", "--no-crc", "--buffer-size", "4096",
        ]);
        let options = cli.extract_options();
        assert_eq!(options.failure_policy, FailurePolicy::Abort);
        assert!(!options.verify_crc);
        assert_eq!(options.buffer_size, 4096);
        assert_eq!(cli.destination(), ".");
        assert!(!cli.is_listing());
    }

    #[test]
    fn listing_filters() {
        let cli = Cli::parse_from([
            "zipdrop", "-l", "--ext", "png", "--ext", "jpg", "--depth", "1", "-qq", "a.zip",
        ]);
        assert!(cli.is_listing());
        assert_eq!(cli.extensions, vec!["png", "jpg"]);
        assert_eq!(cli.depth, Some(1));
        assert!(cli.is_very_quiet());
        assert_eq!(cli.log_level(), "error");
    }
}
