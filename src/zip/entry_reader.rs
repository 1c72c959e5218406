use anyhow::{Result, bail, ensure};
use flate2::{Crc, Decompress, FlushDecompress, Status};

use crate::io::ReadAt;

use super::structures::{CompressionMethod, ZipEntry};

enum Decoder<'a> {
    Stored,
    Deflate {
        inflater: Decompress,
        input: &'a mut [u8],
        pos: usize,
        len: usize,
        finished: bool,
    },
}

/// Streams the decompressed content of one entry, chunk by chunk.
///
/// Output is bounded by the declared uncompressed size: a stream that yields
/// more, or ends before reaching it, is an error.
pub struct EntryReader<'a, R: ReadAt> {
    source: &'a R,
    entry: &'a ZipEntry,
    offset: u64,
    remaining: u64,
    produced: u64,
    crc: Crc,
    decoder: Decoder<'a>,
}

impl<'a, R: ReadAt> EntryReader<'a, R> {
    pub(super) fn new(
        source: &'a R,
        entry: &'a ZipEntry,
        offset: u64,
        input: &'a mut [u8],
    ) -> Result<Self> {
        let decoder = match entry.compression {
            CompressionMethod::Stored => {
                ensure!(
                    entry.compressed_size == entry.uncompressed_size,
                    "stored entry {} has mismatched sizes",
                    entry.name
                );
                Decoder::Stored
            }
            CompressionMethod::Deflate => {
                ensure!(!input.is_empty(), "deflate input buffer is empty");
                Decoder::Deflate {
                    // ZIP stores raw deflate streams, without a zlib header
                    inflater: Decompress::new(false),
                    input,
                    pos: 0,
                    len: 0,
                    finished: false,
                }
            }
            CompressionMethod::Unknown(code) => {
                bail!("compression method {code} of {} is not supported", entry.name)
            }
        };

        Ok(Self {
            source,
            entry,
            offset,
            remaining: entry.compressed_size,
            produced: 0,
            crc: Crc::new(),
            decoder,
        })
    }

    /// Decompressed bytes handed out so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Fill `out` with the next decompressed bytes.
    ///
    /// Returns `0` once the entry is exhausted and its length checked.
    pub async fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let n = match &mut self.decoder {
            Decoder::Stored => {
                let n = out.len().min(self.remaining.min(usize::MAX as u64) as usize);
                self.source.read_exact_at(self.offset, &mut out[..n]).await?;
                self.offset += n as u64;
                self.remaining -= n as u64;
                n
            }
            Decoder::Deflate {
                inflater,
                input,
                pos,
                len,
                finished,
            } => {
                let mut written = 0;
                while !*finished && written < out.len() {
                    if *pos == *len && self.remaining > 0 {
                        let want = input.len().min(self.remaining.min(usize::MAX as u64) as usize);
                        self.source.read_exact_at(self.offset, &mut input[..want]).await?;
                        self.offset += want as u64;
                        self.remaining -= want as u64;
                        *pos = 0;
                        *len = want;
                    }

                    let in_before = inflater.total_in();
                    let out_before = inflater.total_out();
                    let status = inflater.decompress(
                        &input[*pos..*len],
                        &mut out[written..],
                        FlushDecompress::None,
                    )?;
                    let consumed = (inflater.total_in() - in_before) as usize;
                    let emitted = (inflater.total_out() - out_before) as usize;
                    *pos += consumed;
                    written += emitted;

                    if status == Status::StreamEnd {
                        *finished = true;
                    } else if consumed == 0 && emitted == 0 && *pos == *len && self.remaining == 0 {
                        bail!("deflate stream of {} ends early", self.entry.name);
                    } else if consumed == 0 && emitted == 0 && *pos < *len {
                        bail!("deflate stream of {} is corrupt", self.entry.name);
                    }
                }
                written
            }
        };

        self.produced += n as u64;
        if self.produced > self.entry.uncompressed_size {
            bail!(
                "{} inflates past its declared size of {} bytes",
                self.entry.name,
                self.entry.uncompressed_size
            );
        }
        if n == 0 && self.produced < self.entry.uncompressed_size {
            bail!(
                "{} is truncated: {} of {} bytes",
                self.entry.name,
                self.produced,
                self.entry.uncompressed_size
            );
        }

        self.crc.update(&out[..n]);
        Ok(n)
    }

    /// Compare the checksum of everything read so far with the stored one.
    pub fn verify_crc(&self) -> Result<()> {
        let actual = self.crc.sum();
        if actual != self.entry.crc32 {
            bail!(
                "CRC mismatch in {}: expected {:08x}, got {:08x}",
                self.entry.name,
                self.entry.crc32,
                actual
            );
        }
        Ok(())
    }
}
