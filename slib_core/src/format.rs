use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

/// Size of the trailing footer (single u16 entry count) in bytes.
pub const FOOTER_SIZE: u64 = 2;

/// Size of each directory record, in bytes.
///   size:u32 + offset:u32 + name[13]
///   = 4 + 4 + 13 = 21
pub const RECORD_SIZE: u64 = 21;

/// Width of the on-disk name field, including the terminator byte.
pub const NAME_FIELD_LEN: usize = 13;

/// Significant name bytes; the 13th byte of the field is always NUL.
pub const NAME_MAX_LEN: usize = 12;

/// Largest entry count the 16-bit footer can hold.
pub const MAX_ENTRIES: usize = u16::MAX as usize;

/// Entry property key holding the payload offset read from or written to disk.
pub const OFFSET_PROP: &str = "Offset";

/// Bytes that may never appear in an entry name (besides control and
/// non-ASCII bytes).
const FORBIDDEN_NAME_BYTES: &[u8] = b"\"*/:<?\\|";

// ── Footer ─────────────────────────────────────────────────────────────────

/// Read the entry count from the last two bytes of a `len`-byte image.
pub fn read_footer<R: Read + Seek>(r: &mut R, len: u64) -> io::Result<u16> {
    if len < FOOTER_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "image is shorter than the footer",
        ));
    }
    r.seek(SeekFrom::Start(len - FOOTER_SIZE))?;
    r.read_u16::<LittleEndian>()
}

pub fn write_footer<W: Write>(w: &mut W, count: u16) -> io::Result<()> {
    w.write_u16::<LittleEndian>(count)
}

/// Start of the directory for an image of `len` bytes holding `count`
/// records, or `None` when the directory would begin before byte 0.
pub fn dir_offset(len: u64, count: u16) -> Option<u64> {
    len.checked_sub(FOOTER_SIZE + u64::from(count) * RECORD_SIZE)
}

// ── Directory record ───────────────────────────────────────────────────────

/// One fixed-width directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirRecord {
    /// Payload length in bytes.
    pub size: u32,
    /// Absolute offset of the payload from the start of the image.
    pub offset: u32,
    /// NUL-padded name field.
    pub name: [u8; NAME_FIELD_LEN],
}

impl DirRecord {
    /// Build a record for the raw `name` bytes, keeping at most
    /// [`NAME_MAX_LEN`] of them.
    pub fn new(name: impl AsRef<[u8]>, size: u32, offset: u32) -> Self {
        let mut field = [0u8; NAME_FIELD_LEN];
        let bytes = name.as_ref();
        let n = bytes.len().min(NAME_MAX_LEN);
        field[..n].copy_from_slice(&bytes[..n]);
        Self {
            size,
            offset,
            name: field,
        }
    }

    /// Serialize to exactly `RECORD_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE as usize] {
        let mut buf = [0u8; RECORD_SIZE as usize];
        LittleEndian::write_u32(&mut buf[0..4], self.size);
        LittleEndian::write_u32(&mut buf[4..8], self.offset);
        buf[8..21].copy_from_slice(&self.name);
        buf
    }

    /// Deserialize from `RECORD_SIZE` bytes. The last name byte is forced to
    /// NUL, so an over-long name is truncated rather than rejected.
    pub fn from_bytes(buf: &[u8; RECORD_SIZE as usize]) -> Self {
        let mut name = [0u8; NAME_FIELD_LEN];
        name.copy_from_slice(&buf[8..21]);
        name[NAME_MAX_LEN] = 0;
        Self {
            size: LittleEndian::read_u32(&buf[0..4]),
            offset: LittleEndian::read_u32(&buf[4..8]),
            name,
        }
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; RECORD_SIZE as usize];
        r.read_exact(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    /// One past the last payload byte, without overflow.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }

    /// Name bytes up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_LEN);
        &self.name[..len]
    }

    /// Name as a string; bytes that are not UTF-8 are replaced.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}

// ── Names ──────────────────────────────────────────────────────────────────

/// Whether `b` may appear in a stored entry name.
pub fn is_name_byte(b: u8) -> bool {
    (33..=126).contains(&b) && !FORBIDDEN_NAME_BYTES.contains(&b)
}

/// Count the significant characters of a NUL-padded name field, or `None`
/// if a byte before the first NUL is not allowed in a name.
pub fn significant_name_len(field: &[u8]) -> Option<usize> {
    let mut len = 0;
    for &b in field {
        if b == 0 {
            break;
        }
        if !is_name_byte(b) {
            return None;
        }
        len += 1;
    }
    Some(len)
}
