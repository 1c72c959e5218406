use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail, ensure};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unknown(other),
        }
    }
}

impl CompressionMethod {
    pub fn code(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Checks a record's 4-byte signature and returns a cursor just past it.
fn open_record<'a>(
    data: &'a [u8],
    signature: &[u8],
    min_len: usize,
    what: &str,
) -> Result<Cursor<&'a [u8]>> {
    ensure!(data.len() >= min_len, "truncated {what}");
    if &data[..4] != signature {
        bail!("bad {what} signature");
    }
    let mut cursor = Cursor::new(data);
    cursor.set_position(4);
    Ok(cursor)
}

/// End of central directory record.
pub struct EndOfCentralDirectory {
    pub entries_on_disk: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor =
            open_record(data, Self::SIGNATURE, Self::SIZE, "end of central directory")?;
        let disk = cursor.read_u16::<LittleEndian>()?;
        let cd_disk = cursor.read_u16::<LittleEndian>()?;
        ensure!(disk == cd_disk || disk == 0xFFFF, "multi-disk archives are not supported");

        Ok(Self {
            entries_on_disk: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Any saturated field means the real value lives in the ZIP64 record.
    pub fn needs_zip64(&self) -> bool {
        self.entries_on_disk == u16::MAX
            || self.total_entries == u16::MAX
            || self.cd_size == u32::MAX
            || self.cd_offset == u32::MAX
    }
}

/// ZIP64 end of central directory locator, found right before the EOCD.
pub struct Zip64Locator {
    pub eocd64_offset: u64,
}

impl Zip64Locator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = open_record(data, Self::SIGNATURE, Self::SIZE, "ZIP64 locator")?;
        let _eocd64_disk = cursor.read_u32::<LittleEndian>()?;
        Ok(Self {
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// ZIP64 end of central directory record; only the fields we use.
pub struct Zip64EndOfCentralDirectory {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = open_record(
            data,
            Self::SIGNATURE,
            Self::MIN_SIZE,
            "ZIP64 end of central directory",
        )?;
        // record size, version made by, version needed, disk, cd disk, entries on disk
        cursor.set_position(4 + 8 + 2 + 2 + 4 + 4 + 8);
        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central directory file header: signature and fixed part.
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local file header: signature and fixed part.
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Extra field tag carrying 64-bit sizes and offsets.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

const FLAG_ENCRYPTED: u16 = 0x0001;

/// One record of the archive's file list, as read from the central directory.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Name as stored; directories keep their trailing `/`.
    pub name: String,
    pub compression: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub flags: u16,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipEntry {
    /// Path segments of the entry, with empty and `.` segments removed.
    ///
    /// Both `/` and `\` separate segments, since some archivers on Windows
    /// write backslashes.
    pub fn segments(&self) -> Vec<&str> {
        self.name
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .collect()
    }

    /// Name without the trailing separator directories carry.
    pub fn display_name(&self) -> &str {
        self.name.trim_end_matches(['/', '\\'])
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

#[cfg(test)]
impl ZipEntry {
    /// Empty stored entry, a directory when `name` ends with `/`.
    pub(crate) fn named(name: &str) -> Self {
        ZipEntry {
            name: name.to_string(),
            compression: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            flags: 0,
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            is_directory: name.ends_with('/'),
        }
    }
}
