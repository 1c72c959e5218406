//! ZIP archive reading.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`archive`]: Locating and parsing the central directory into a [`ZipArchive`]
//! - [`entry_reader`]: Streaming, size-bounded decoding of a single entry
//! - [`find`]: Lookups over one or several opened archives
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED and DEFLATE compression methods
//! - CRC-32 verification of decoded content
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod archive;
mod entry_reader;
mod find;
mod structures;

pub use archive::ZipArchive;
pub use entry_reader::EntryReader;
pub use find::{ArchiveSet, find_entries};
pub use structures::*;
