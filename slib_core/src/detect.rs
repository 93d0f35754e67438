//! Format recognition without magic bytes.
//!
//! A LIB archive has no signature, so recognition relies on structural
//! self-consistency: the footer count must place the directory inside the
//! image, the first record must start at payload offset 0 and fit the image,
//! its separator byte must be zero, and its name must be a plausible DOS
//! file name. Crafted input can still pass.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::format::{dir_offset, read_footer, significant_name_len, NAME_MAX_LEN};

/// Smallest image the detector will consider.
pub const MIN_ARCHIVE_SIZE: u64 = 64;

/// Thresholds for the detection heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectOptions {
    /// Images shorter than this are rejected outright.
    pub min_size: u64,
    /// Minimum significant characters in the first record's name.
    pub min_name_len: usize,
}

impl DetectOptions {
    /// Thresholds used for in-memory buffers: at least a one-character stem
    /// plus the extension dot.
    pub const fn buffer() -> Self {
        Self {
            min_size: MIN_ARCHIVE_SIZE,
            min_name_len: 2,
        }
    }

    /// Thresholds used for files on disk. Historically laxer on the name
    /// than the buffer check; kept as is.
    pub const fn file() -> Self {
        Self {
            min_size: MIN_ARCHIVE_SIZE,
            min_name_len: 1,
        }
    }
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self::buffer()
    }
}

/// Whether `data` looks like a LIB archive.
pub fn is_lib_archive(data: &[u8]) -> bool {
    is_lib_archive_with(data, DetectOptions::buffer())
}

pub fn is_lib_archive_with(data: &[u8], opts: DetectOptions) -> bool {
    detect_with(&mut Cursor::new(data), data.len() as u64, opts)
}

/// Whether the file at `path` looks like a LIB archive. Only the footer and
/// the first directory record are read.
pub fn is_lib_file(path: impl AsRef<Path>) -> bool {
    is_lib_file_with(path, DetectOptions::file())
}

pub fn is_lib_file_with(path: impl AsRef<Path>, opts: DetectOptions) -> bool {
    let path = path.as_ref();
    let Ok(mut file) = File::open(path) else {
        tracing::trace!("detect: cannot open {}", path.display());
        return false;
    };
    let Ok(len) = file.metadata().map(|m| m.len()) else {
        return false;
    };
    detect_with(&mut file, len, opts)
}

/// Run the heuristic over any seekable source of `len` bytes.
///
/// Never fails: read errors and short reads count as "not a LIB archive".
pub fn detect_with<R: Read + Seek>(r: &mut R, len: u64, opts: DetectOptions) -> bool {
    match probe(r, len, opts) {
        Ok(Ok(())) => true,
        Ok(Err(reason)) => {
            tracing::trace!("detect: rejected, {}", reason);
            false
        }
        Err(e) => {
            tracing::trace!("detect: read failed, {}", e);
            false
        }
    }
}

fn probe<R: Read + Seek>(
    r: &mut R,
    len: u64,
    opts: DetectOptions,
) -> io::Result<std::result::Result<(), &'static str>> {
    if len < opts.min_size {
        return Ok(Err("image too small"));
    }

    let count = read_footer(r, len)?;
    let Some(dir_start) = dir_offset(len, count) else {
        return Ok(Err("directory starts before the image"));
    };

    // First record, with the name's last byte read on its own as a separator.
    r.seek(SeekFrom::Start(dir_start))?;
    let size = r.read_u32::<LittleEndian>()?;
    let offset = r.read_u32::<LittleEndian>()?;
    let mut name = [0u8; NAME_MAX_LEN];
    r.read_exact(&mut name)?;
    let separator = r.read_u8()?;

    if separator != 0 {
        return Ok(Err("name separator is not zero"));
    }
    if offset != 0 {
        return Ok(Err("first entry does not start at offset 0"));
    }
    if u64::from(offset) + u64::from(size) > len {
        return Ok(Err("first entry runs past the end"));
    }

    match significant_name_len(&name) {
        None => Ok(Err("first entry name has illegal characters")),
        Some(n) if n < opts.min_name_len => Ok(Err("first entry name too short")),
        Some(_) => Ok(Ok(())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{write_footer, DirRecord};

    /// 60 payload bytes followed by one record and the footer.
    fn image(name: &str, size: u32, offset: u32) -> Vec<u8> {
        let mut data = vec![0xAAu8; 60];
        DirRecord::new(name, size, offset).write_to(&mut data).unwrap();
        write_footer(&mut data, 1).unwrap();
        data
    }

    #[test]
    fn accepts_plausible_archive() {
        assert!(is_lib_archive(&image("WALL.IMG", 60, 0)));
    }

    #[test]
    fn rejects_short_buffers() {
        assert!(!is_lib_archive(&[]));
        assert!(!is_lib_archive(&[0u8; 63]));
    }

    #[test]
    fn rejects_nonzero_first_offset() {
        assert!(!is_lib_archive(&image("WALL.IMG", 10, 4)));
    }

    #[test]
    fn rejects_nonzero_separator() {
        let mut data = image("WALL.IMG", 60, 0);
        let sep = data.len() - 3;
        data[sep] = b'X';
        assert!(!is_lib_archive(&data));
    }

    #[test]
    fn rejects_entry_past_end() {
        assert!(!is_lib_archive(&image("WALL.IMG", 500, 0)));
    }

    #[test]
    fn rejects_count_larger_than_image() {
        let mut data = image("WALL.IMG", 60, 0);
        let n = data.len();
        data[n - 2..].copy_from_slice(&100u16.to_le_bytes());
        assert!(!is_lib_archive(&data));
    }

    #[test]
    fn rejects_illegal_name_bytes() {
        assert!(!is_lib_archive(&image("A?B", 0, 0)));
        assert!(!is_lib_archive(&image("A B", 0, 0)));
    }

    #[test]
    fn empty_name_rejected() {
        assert!(!is_lib_archive(&image("", 0, 0)));
        let opts = DetectOptions::file();
        assert!(!is_lib_archive_with(&image("", 0, 0), opts));
    }

    #[test]
    fn one_character_name_depends_on_threshold() {
        // The buffer check wants two characters, the file check one.
        let data = image("A", 0, 0);
        assert!(!is_lib_archive(&data));
        assert!(is_lib_archive_with(&data, DetectOptions::file()));
    }

    #[test]
    fn file_check_applies_size_and_separator_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WALLS.LIB");

        // Well-formed, but 63 bytes long.
        let mut short = vec![0xAAu8; 40];
        DirRecord::new("WALL.IMG", 40, 0).write_to(&mut short).unwrap();
        write_footer(&mut short, 1).unwrap();
        assert_eq!(short.len(), 63);
        std::fs::write(&path, &short).unwrap();
        assert!(!is_lib_file(&path));

        let mut data = image("WALL.IMG", 60, 0);
        std::fs::write(&path, &data).unwrap();
        assert!(is_lib_file(&path));

        let sep = data.len() - 3;
        data[sep] = b'X';
        std::fs::write(&path, &data).unwrap();
        assert!(!is_lib_file(&path));
    }

    #[test]
    fn missing_file_is_not_an_archive() {
        assert!(!is_lib_file("/nonexistent/path/to/archive.lib"));
    }
}
