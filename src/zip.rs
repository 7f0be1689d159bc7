//! In-memory ZIP reader for EPUB containers
//!
//! The whole container is held as one byte buffer. The central directory is
//! indexed once in [`Archive::open`]; after that every lookup takes `&self`,
//! so an `Archive` can be shared behind an `Arc` by any number of readers.
//! Supports stored and DEFLATE entries (via miniz_oxide) with CRC-32 checks.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use log;
use miniz_oxide::{DataFormat, MZFlush, MZStatus};
use std::io::Read;

use crate::error::EpubError;

// Re-export the crate's public ZIP error alias for module consumers.
pub use crate::error::ZipError;

/// Default cap on the number of central directory entries indexed
const DEFAULT_MAX_ENTRIES: usize = 4096;

/// Default cap on a single entry's compressed or uncompressed size (64 MiB)
const DEFAULT_MAX_FILE_READ_SIZE: usize = 64 * 1024 * 1024;

/// Local file header signature (little-endian)
const SIG_LOCAL_FILE_HEADER: u32 = 0x04034b50;

/// Central directory entry signature (little-endian)
const SIG_CD_ENTRY: u32 = 0x02014b50;

/// End of central directory signature (little-endian)
const SIG_EOCD: u32 = 0x06054b50;
/// ZIP64 end of central directory locator signature (little-endian)
const SIG_ZIP64_EOCD_LOCATOR: u32 = 0x07064b50;
/// Minimum EOCD record size in bytes
const EOCD_MIN_SIZE: usize = 22;
/// Maximum EOCD search window (EOCD + max comment length)
const MAX_EOCD_SCAN: usize = EOCD_MIN_SIZE + u16::MAX as usize;
/// Fixed part of a central directory record, signature included
const CD_ENTRY_FIXED_SIZE: usize = 46;
/// Fixed part of a local file header, signature included
const LOCAL_HEADER_FIXED_SIZE: usize = 30;

/// Compression methods
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// Required content of the `mimetype` entry
const EPUB_MIMETYPE: &str = "application/epub+zip";

/// Runtime-configurable ZIP safety limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZipLimits {
    /// Maximum compressed or uncompressed size of an entry that may be read.
    pub max_file_read_size: usize,
    /// Maximum number of central directory entries indexed.
    pub max_entries: usize,
    /// Maximum bytes scanned from the container tail while searching for EOCD.
    pub max_eocd_scan: usize,
    /// Fail on structural issues instead of indexing what is readable.
    pub strict: bool,
}

impl Default for ZipLimits {
    fn default() -> Self {
        Self {
            max_file_read_size: DEFAULT_MAX_FILE_READ_SIZE,
            max_entries: DEFAULT_MAX_ENTRIES,
            max_eocd_scan: MAX_EOCD_SCAN,
            strict: false,
        }
    }
}

impl ZipLimits {
    /// Create explicit ZIP limits.
    pub fn new(max_file_read_size: usize, max_entries: usize) -> Self {
        Self {
            max_file_read_size,
            max_entries,
            ..Self::default()
        }
    }

    /// Enable or disable strict ZIP parsing behavior.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set a cap for EOCD tail scan bytes.
    pub fn with_max_eocd_scan(mut self, max_eocd_scan: usize) -> Self {
        self.max_eocd_scan = max_eocd_scan.clamp(EOCD_MIN_SIZE, MAX_EOCD_SCAN);
        self
    }
}

#[derive(Clone, Copy, Debug)]
struct EocdInfo {
    cd_offset: usize,
    cd_size: usize,
    num_entries: u16,
    uses_zip64: bool,
}

/// Central directory entry metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdEntry {
    /// Compression method (0=stored, 8=deflated)
    pub method: u16,
    /// Compressed size in bytes
    pub compressed_size: u32,
    /// Uncompressed size in bytes
    pub uncompressed_size: u32,
    /// Offset to local file header
    pub local_header_offset: u32,
    /// CRC32 checksum
    pub crc32: u32,
    /// Entry path inside the archive
    pub filename: String,
}

/// Fully indexed, read-only ZIP container.
#[derive(Debug, Clone)]
pub struct Archive {
    data: Vec<u8>,
    entries: Vec<CdEntry>,
    /// Entry path to position in `entries`; the first duplicate wins.
    index: BTreeMap<String, usize>,
    limits: ZipLimits,
}

impl Archive {
    /// Index a ZIP container held in memory.
    pub fn open(data: Vec<u8>) -> Result<Self, EpubError> {
        Self::open_with_limits(data, ZipLimits::default())
    }

    /// Index a ZIP container with explicit runtime limits.
    pub fn open_with_limits(data: Vec<u8>, limits: ZipLimits) -> Result<Self, EpubError> {
        let eocd = find_eocd(&data, limits.max_eocd_scan.min(MAX_EOCD_SCAN))?;
        if eocd.uses_zip64 {
            return Err(ZipError::UnsupportedZip64.into());
        }
        let declared = eocd.num_entries as usize;
        if limits.strict && declared > limits.max_entries {
            return Err(ZipError::CentralDirFull.into());
        }

        let cd_end = eocd.cd_offset + eocd.cd_size;
        let mut entries = Vec::with_capacity(declared.min(limits.max_entries));
        let mut pos = eocd.cd_offset;
        for _ in 0..declared.min(limits.max_entries) {
            if pos >= cd_end {
                if limits.strict {
                    return Err(ZipError::InvalidFormat.into());
                }
                break;
            }
            match read_cd_entry(&data[..cd_end], pos)? {
                Some((entry, next)) => {
                    entries.push(entry);
                    pos = next;
                }
                None if limits.strict => return Err(ZipError::InvalidFormat.into()),
                None => break,
            }
        }

        if declared > limits.max_entries {
            log::warn!(
                "[ZIP] Archive has {} entries but only {} were loaded (max: {})",
                declared,
                entries.len(),
                limits.max_entries
            );
        }

        log::debug!(
            "[ZIP] Parsed {} central directory entries (offset {})",
            entries.len(),
            eocd.cd_offset
        );

        let mut index = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            index.entry(entry.filename.clone()).or_insert(i);
        }

        Ok(Self {
            data,
            entries,
            index,
            limits,
        })
    }

    /// Read a whole container from `reader` and index it.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, EpubError> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| EpubError::Io(e.to_string()))?;
        Self::open(data)
    }

    /// Get entry by path.
    ///
    /// Exact match first, then ASCII case-insensitive, tolerating a leading
    /// slash on either side.
    pub fn get_entry(&self, name: &str) -> Option<&CdEntry> {
        if let Some(&i) = self.index.get(name) {
            return self.entries.get(i);
        }
        let wanted = name.strip_prefix('/').unwrap_or(name);
        self.entries.iter().find(|e| {
            let have = e.filename.strip_prefix('/').unwrap_or(&e.filename);
            have.eq_ignore_ascii_case(wanted)
        })
    }

    /// True when an entry exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.get_entry(path).is_some()
    }

    /// Decompressed bytes of the entry at `path`.
    ///
    /// Absent entries, oversize entries and entries that fail to decode all
    /// read as `None`; the latter two are logged.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let entry = self.get_entry(path)?;
        match self.read_entry(entry) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                log::warn!("[ZIP] Failed to read '{}': {}", entry.filename, err);
                None
            }
        }
    }

    /// Entry at `path` decoded as UTF-8 with any byte-order mark removed.
    pub fn get_text(&self, path: &str) -> Option<String> {
        let bytes = self.get(path)?;
        let bytes = bytes
            .strip_prefix(&[0xEF, 0xBB, 0xBF][..])
            .map(<[u8]>::to_vec)
            .unwrap_or(bytes);
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(_) => {
                log::warn!("[ZIP] Entry '{}' is not valid UTF-8", path);
                None
            }
        }
    }

    /// Read and decompress one entry, verifying its CRC-32.
    pub fn read_entry(&self, entry: &CdEntry) -> Result<Vec<u8>, ZipError> {
        if entry.uncompressed_size as usize > self.limits.max_file_read_size
            || entry.compressed_size as usize > self.limits.max_file_read_size
        {
            return Err(ZipError::FileTooLarge);
        }

        let data_offset = self.calc_data_offset(entry)?;
        let compressed = self
            .data
            .get(data_offset..data_offset + entry.compressed_size as usize)
            .ok_or(ZipError::InvalidFormat)?;

        let out = match entry.method {
            METHOD_STORED => compressed.to_vec(),
            METHOD_DEFLATED => inflate(compressed, entry.uncompressed_size as usize)?,
            _ => return Err(ZipError::UnsupportedCompression),
        };

        if entry.crc32 != 0 && crc32fast::hash(&out) != entry.crc32 {
            return Err(ZipError::CrcMismatch);
        }
        Ok(out)
    }

    /// Calculate the offset to the actual file data (past local header)
    fn calc_data_offset(&self, entry: &CdEntry) -> Result<usize, ZipError> {
        let offset = entry.local_header_offset as usize;
        let header = self
            .data
            .get(offset..offset + LOCAL_HEADER_FIXED_SIZE)
            .ok_or(ZipError::InvalidFormat)?;
        if read_u32_le(header, 0) != SIG_LOCAL_FILE_HEADER {
            return Err(ZipError::InvalidFormat);
        }
        let name_len = read_u16_le(header, 26) as usize;
        let extra_len = read_u16_le(header, 28) as usize;
        Ok(offset + LOCAL_HEADER_FIXED_SIZE + name_len + extra_len)
    }

    /// Validate that the archive contains a valid EPUB mimetype file
    ///
    /// Checks that a file named "mimetype" exists and its content is exactly
    /// `application/epub+zip`.
    pub fn validate_mimetype(&self) -> Result<(), EpubError> {
        let entry = self.get_entry("mimetype").ok_or_else(|| {
            EpubError::InvalidMimetype("mimetype file not found in archive".to_string())
        })?;
        if entry.uncompressed_size as usize > EPUB_MIMETYPE.len() * 4 {
            return Err(EpubError::InvalidMimetype(
                "mimetype file too large".to_string(),
            ));
        }
        let bytes = self.read_entry(entry)?;
        let content = core::str::from_utf8(&bytes).map_err(|_| {
            EpubError::InvalidMimetype("mimetype file is not valid UTF-8".to_string())
        })?;
        if content.trim_end() != EPUB_MIMETYPE {
            return Err(EpubError::InvalidMimetype(alloc::format!(
                "expected '{}', got '{}'",
                EPUB_MIMETYPE,
                content
            )));
        }
        Ok(())
    }

    /// Get number of indexed entries
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over all indexed entries
    pub fn entries(&self) -> impl Iterator<Item = &CdEntry> {
        self.entries.iter()
    }

    /// Get the active limits used by this archive.
    pub fn limits(&self) -> ZipLimits {
        self.limits
    }
}

/// Find EOCD and extract central directory info
fn find_eocd(data: &[u8], max_eocd_scan: usize) -> Result<EocdInfo, ZipError> {
    let file_size = data.len();
    if file_size < EOCD_MIN_SIZE {
        return Err(ZipError::InvalidFormat);
    }

    let scan_base = file_size - file_size.min(max_eocd_scan);
    let window = &data[scan_base..];
    if window.len() < EOCD_MIN_SIZE {
        return Err(ZipError::InvalidFormat);
    }

    // Scan backwards for EOCD signature
    for i in (0..=window.len() - EOCD_MIN_SIZE).rev() {
        if read_u32_le(window, i) != SIG_EOCD {
            continue;
        }
        let num_entries = read_u16_le(window, i + 8);
        let cd_size = read_u32_le(window, i + 12);
        let cd_offset = read_u32_le(window, i + 16);
        let comment_len = read_u16_le(window, i + 20) as usize;
        let eocd_pos = scan_base + i;
        if eocd_pos + EOCD_MIN_SIZE + comment_len != file_size {
            continue;
        }

        let uses_zip64_sentinel =
            num_entries == u16::MAX || cd_size == u32::MAX || cd_offset == u32::MAX;
        let uses_zip64_locator =
            eocd_pos >= 20 && read_u32_le(data, eocd_pos - 20) == SIG_ZIP64_EOCD_LOCATOR;
        if uses_zip64_sentinel || uses_zip64_locator {
            return Ok(EocdInfo {
                cd_offset: 0,
                cd_size: 0,
                num_entries,
                uses_zip64: true,
            });
        }

        let cd_offset = cd_offset as usize;
        let cd_size = cd_size as usize;
        let cd_end = cd_offset
            .checked_add(cd_size)
            .ok_or(ZipError::InvalidFormat)?;
        if cd_end > eocd_pos {
            return Err(ZipError::InvalidFormat);
        }

        return Ok(EocdInfo {
            cd_offset,
            cd_size,
            num_entries,
            uses_zip64: false,
        });
    }

    Err(ZipError::InvalidFormat)
}

/// Parse the central directory record starting at `pos`.
///
/// Returns the entry and the offset of the next record, or `None` when no
/// record signature is present.
fn read_cd_entry(cd: &[u8], pos: usize) -> Result<Option<(CdEntry, usize)>, ZipError> {
    let Some(buf) = cd.get(pos..pos + CD_ENTRY_FIXED_SIZE) else {
        return Ok(None);
    };
    if read_u32_le(buf, 0) != SIG_CD_ENTRY {
        return Ok(None);
    }

    let name_len = read_u16_le(buf, 28) as usize;
    let extra_len = read_u16_le(buf, 30) as usize;
    let comment_len = read_u16_le(buf, 32) as usize;
    let name_start = pos + CD_ENTRY_FIXED_SIZE;
    let name = cd
        .get(name_start..name_start + name_len)
        .ok_or(ZipError::InvalidFormat)?;

    let entry = CdEntry {
        method: read_u16_le(buf, 10),
        crc32: read_u32_le(buf, 16),
        compressed_size: read_u32_le(buf, 20),
        uncompressed_size: read_u32_le(buf, 24),
        local_header_offset: read_u32_le(buf, 42),
        filename: String::from_utf8_lossy(name).into_owned(),
    };
    Ok(Some((entry, name_start + name_len + extra_len + comment_len)))
}

/// Inflate a raw DEFLATE stream whose output size is known up front.
fn inflate(compressed: &[u8], uncompressed_size: usize) -> Result<Vec<u8>, ZipError> {
    let mut state =
        alloc::boxed::Box::new(miniz_oxide::inflate::stream::InflateState::new(DataFormat::Raw));
    let mut out = alloc::vec![0u8; uncompressed_size];
    let mut pending = compressed;
    let mut written = 0usize;

    loop {
        let result = miniz_oxide::inflate::stream::inflate(
            &mut state,
            pending,
            &mut out[written..],
            MZFlush::Finish,
        );
        let consumed = result.bytes_consumed;
        let produced = result.bytes_written;
        pending = &pending[consumed..];
        written += produced;

        match result.status {
            Ok(MZStatus::StreamEnd) => break,
            Ok(MZStatus::Ok) => {
                if consumed == 0 && produced == 0 {
                    return Err(ZipError::DecompressError);
                }
            }
            Ok(MZStatus::NeedDict) => return Err(ZipError::DecompressError),
            Err(_) => return Err(ZipError::DecompressError),
        }
    }

    if written != uncompressed_size {
        return Err(ZipError::DecompressError);
    }
    Ok(out)
}

/// Read u16 from buffer at offset (little-endian)
fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Read u32 from buffer at offset (little-endian)
fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
