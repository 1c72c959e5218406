//! Central directory parsing.
//!
//! ZIP files are read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If any EOCD field is saturated, follow the ZIP64 locator
//! 3. Read the Central Directory in one go and parse every header
//! 4. For extraction, read each entry's Local File Header to find its data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::io::ReadAt;
use anyhow::{Context, Result, bail, ensure};

use super::entry_reader::EntryReader;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// An opened archive: the byte source plus its parsed file list.
///
/// Dropping it releases the source.
pub struct ZipArchive<R: ReadAt> {
    reader: R,
    entries: Vec<ZipEntry>,
}

impl<R: ReadAt> ZipArchive<R> {
    /// Parse the central directory of `reader`.
    ///
    /// Fails when the source is not a ZIP archive or its directory is damaged.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn open(reader: R) -> Result<Self> {
        let (eocd, eocd_offset) = find_eocd(&reader).await?;

        let (cd_offset, cd_size, total_entries) = if eocd.needs_zip64() {
            let eocd64 = read_zip64_eocd(&reader, eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        let cd_end = cd_offset
            .checked_add(cd_size)
            .filter(|end| *end <= eocd_offset)
            .context("central directory lies outside the archive")?;
        ensure!(
            total_entries.saturating_mul(CDFH_MIN_SIZE as u64) <= cd_size,
            "central directory is too small for {total_entries} entries"
        );
        tracing::debug!(cd_offset, cd_end, total_entries, "reading central directory");

        let mut cd_data = vec![0u8; cd_size as usize];
        reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let mut cursor = Cursor::new(cd_data.as_slice());
        let entries = (0..total_entries)
            .map(|i| {
                parse_cdfh(&mut cursor).with_context(|| format!("central directory entry {i}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { reader, entries })
    }

    /// The archive's file list, in central directory order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the declared uncompressed sizes of every entry.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.uncompressed_size).sum()
    }

    /// Position of the entry named exactly `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Get the actual data offset for an entry.
    ///
    /// The Local File Header has its own name and extra field lengths, which
    /// may differ from the Central Directory copy.
    pub async fn data_offset(&self, entry: &ZipEntry) -> Result<u64> {
        let mut lfh = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh)
            .await
            .context("local file header is out of bounds")?;

        if &lfh[0..4] != LFH_SIGNATURE {
            bail!("invalid local file header for {}", entry.name);
        }

        let mut cursor = Cursor::new(&lfh[26..]);
        let name_len = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_len = cursor.read_u16::<LittleEndian>()? as u64;

        let offset = entry.lfh_offset + LFH_SIZE as u64 + name_len + extra_len;
        ensure!(
            offset.saturating_add(entry.compressed_size) <= self.reader.size(),
            "data of {} runs past the end of the archive",
            entry.name
        );
        Ok(offset)
    }

    /// Open a streaming decoder over `entry`'s content.
    ///
    /// `input` is scratch space for compressed bytes; it is only used for
    /// DEFLATE entries and must not be empty.
    pub async fn entry_reader<'a>(
        &'a self,
        entry: &'a ZipEntry,
        input: &'a mut [u8],
    ) -> Result<EntryReader<'a, R>> {
        if entry.is_encrypted() {
            bail!("{} is encrypted", entry.name);
        }
        let offset = self.data_offset(entry).await?;
        EntryReader::new(&self.reader, entry, offset, input)
    }

    /// Read a whole entry into memory, verifying its checksum.
    pub async fn read_to_vec(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        let mut input = vec![0u8; 64 * 1024];
        let mut reader = self.entry_reader(entry, &mut input).await?;

        let mut data = vec![0u8; entry.uncompressed_size as usize];
        let mut filled = 0;
        loop {
            let n = reader.read_chunk(&mut data[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        reader.verify_crc()?;
        data.truncate(filled);
        Ok(data)
    }
}

/// Find and parse the End of Central Directory record.
///
/// Returns the record and its offset in the source.
async fn find_eocd<R: ReadAt>(reader: &R) -> Result<(EndOfCentralDirectory, u64)> {
    let size = reader.size();
    let record = EndOfCentralDirectory::SIZE as u64;
    ensure!(size >= record, "not a ZIP archive: {size} bytes is too short");

    // Common case: no archive comment
    let offset = size - record;
    let mut buf = [0u8; EndOfCentralDirectory::SIZE];
    reader.read_exact_at(offset, &mut buf).await?;
    if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
        return Ok((EndOfCentralDirectory::parse(&buf)?, offset));
    }

    let search_size = (MAX_COMMENT_SIZE + record).min(size);
    let search_start = size - search_size;
    let mut tail = vec![0u8; search_size as usize];
    reader.read_exact_at(search_start, &mut tail).await?;

    for i in (0..=tail.len() - EndOfCentralDirectory::SIZE).rev() {
        if &tail[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }
        // The comment must run exactly to the end of the file
        let comment_len = u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as usize;
        if comment_len == tail.len() - i - EndOfCentralDirectory::SIZE {
            let eocd = EndOfCentralDirectory::parse(&tail[i..i + EndOfCentralDirectory::SIZE])?;
            return Ok((eocd, search_start + i as u64));
        }
    }

    bail!("not a ZIP archive: end of central directory not found")
}

async fn read_zip64_eocd<R: ReadAt>(
    reader: &R,
    eocd_offset: u64,
) -> Result<Zip64EndOfCentralDirectory> {
    let locator_offset = eocd_offset
        .checked_sub(Zip64Locator::SIZE as u64)
        .context("ZIP64 locator missing")?;
    let mut locator = [0u8; Zip64Locator::SIZE];
    reader.read_exact_at(locator_offset, &mut locator).await?;
    let locator = Zip64Locator::parse(&locator)?;

    let mut record = [0u8; Zip64EndOfCentralDirectory::MIN_SIZE];
    reader
        .read_exact_at(locator.eocd64_offset, &mut record)
        .await
        .context("ZIP64 end of central directory is out of bounds")?;
    Zip64EndOfCentralDirectory::parse(&record)
}

/// Parse one Central Directory File Header and advance past it.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        bail!("invalid central directory file header");
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let name_len = cursor.read_u16::<LittleEndian>()? as usize;
    let extra_len = cursor.read_u16::<LittleEndian>()? as u64;
    let comment_len = cursor.read_u16::<LittleEndian>()? as u64;
    let _disk_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut name = vec![0u8; name_len];
    cursor.read_exact(&mut name)?;
    let name = String::from_utf8_lossy(&name).into_owned();
    let is_directory = name.ends_with('/') || name.ends_with('\\');

    let extra_end = cursor.position() + extra_len;
    ensure!(
        extra_end + comment_len <= cursor.get_ref().len() as u64,
        "extra field of {name} overruns the central directory"
    );

    while cursor.position() + 4 <= extra_end {
        let id = cursor.read_u16::<LittleEndian>()?;
        let field_len = cursor.read_u16::<LittleEndian>()? as u64;
        let field_end = (cursor.position() + field_len).min(extra_end);

        if id == ZIP64_EXTRA_ID {
            // Only the saturated header fields are present, in this order
            if uncompressed_size == u32::MAX as u64 && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == u32::MAX as u64 && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == u32::MAX as u64 && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }

    cursor.set_position(extra_end + comment_len);

    Ok(ZipEntry {
        name,
        compression: CompressionMethod::from(compression),
        compressed_size,
        uncompressed_size,
        crc32,
        flags,
        lfh_offset,
        last_mod_time,
        last_mod_date,
        is_directory,
    })
}
