use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::archive::Archive;
use crate::codec::{NoProgress, ProgressSink, TypeDetector};
use crate::entry::{Entry, EntryState, PropValue};
use crate::error::{Error, Result};
use crate::format::{dir_offset, read_footer, DirRecord, FOOTER_SIZE, OFFSET_PROP};

/// Reads LIB archive images into an [`Archive`].
///
/// # Open sequence
/// 1. Read the trailing u16 entry count.
/// 2. Derive the directory start as `len - (2 + count * 21)`.
/// 3. Read and validate every record. One record reaching into the directory
///    rejects the whole image, and no entries are added.
/// 4. Append one entry per record in directory order, copy each non-empty
///    payload out of the image, and hand every entry to the type detector.
///
/// The archive's change notifications are suspended for steps 3–4 and the
/// archive is left unmodified afterwards.
pub struct Reader<'a> {
    detector: &'a dyn TypeDetector,
    progress: Box<dyn ProgressSink + 'a>,
}

impl<'a> Reader<'a> {
    pub fn new(detector: &'a dyn TypeDetector) -> Self {
        Self {
            detector,
            progress: Box::new(NoProgress),
        }
    }

    /// Report open progress to `sink`.
    pub fn with_progress(mut self, sink: impl ProgressSink + 'a) -> Self {
        self.progress = Box::new(sink);
        self
    }

    /// Read the file at `path` and open it, recording `path` as the archive's
    /// backing file for later lazy loads.
    pub fn open_file(&mut self, archive: &mut Archive, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        self.open(archive, &data)?;
        archive.set_filename(path);
        Ok(())
    }

    /// Parse `data` and append its entries to `archive`.
    pub fn open(&mut self, archive: &mut Archive, data: &[u8]) -> Result<()> {
        let len = data.len() as u64;
        if len < FOOTER_SIZE {
            return Err(Error::InsufficientData { len: data.len() });
        }

        let mut cur = Cursor::new(data);
        let count = read_footer(&mut cur, len)?;
        let dir_start = dir_offset(len, count).ok_or_else(|| {
            tracing::warn!("lib: footer claims {} entries in {} bytes", count, len);
            Error::corrupt(format!(
                "footer claims {count} entries but the archive is only {len} bytes"
            ))
        })?;
        tracing::debug!("lib: {} entries, directory at {}", count, dir_start);

        // ── Read and validate the directory ────────────────────────────────
        let records = self.read_directory(&mut cur, count, dir_start)?;

        // ── Populate ───────────────────────────────────────────────────────
        let mut guard = archive.block_signals();
        let first = guard.len();
        for rec in &records {
            let mut entry = Entry::from_stored_name(rec.name_bytes(), rec.size);
            entry.set_prop(OFFSET_PROP, PropValue::Int(i64::from(rec.offset)));
            entry.set_state(EntryState::Unmodified);
            guard.add_entry(entry);
        }

        // ── Load payloads and detect types ─────────────────────────────────
        self.progress.set_message("Detecting entry types");
        let total = records.len();
        for (i, rec) in records.iter().enumerate() {
            self.progress.set_progress(phase_fraction(1, i, total));

            let entry = &mut guard.entries_mut()[first + i];
            if rec.size > 0 {
                // In bounds: rec.end() <= dir_start <= len was checked above.
                let start = rec.offset as usize;
                let end = start + rec.size as usize;
                entry.fill_from_store(data[start..end].to_vec());
            }
            self.detector.detect(entry);
            entry.set_state(EntryState::Unmodified);
        }

        self.progress.set_message("Detecting structures");
        self.detector.detect_structures(&mut guard);

        drop(guard);
        archive.set_modified(false);

        self.progress.set_progress(1.0);
        self.progress.set_message("");
        Ok(())
    }

    fn read_directory(
        &mut self,
        cur: &mut Cursor<&[u8]>,
        count: u16,
        dir_start: u64,
    ) -> Result<Vec<DirRecord>> {
        self.progress.set_message("Reading archive data");
        cur.seek(SeekFrom::Start(dir_start))?;

        let total = usize::from(count);
        let mut records = Vec::with_capacity(total);
        for i in 0..total {
            self.progress.set_progress(phase_fraction(0, i, total));

            let rec = DirRecord::read_from(cur)?;
            if rec.end() > dir_start {
                tracing::warn!(
                    "lib: entry {} ({}) spans {}..{} past directory at {}",
                    i,
                    rec.name_lossy(),
                    rec.offset,
                    rec.end(),
                    dir_start
                );
                return Err(Error::corrupt(format!(
                    "entry {i} ({}) ends at {} but the directory starts at {dir_start}",
                    rec.name_lossy(),
                    rec.end()
                )));
            }
            records.push(rec);
        }
        Ok(records)
    }
}

/// Open progress is split in two halves: directory reading, then type detection.
fn phase_fraction(phase: usize, done: usize, total: usize) -> f32 {
    let within = if total == 0 {
        0.0
    } else {
        done as f32 / total as f32
    };
    (phase as f32 + within) / 2.0
}

/// Load an entry's payload from the archive file at `path`.
///
/// Entries that are already loaded or empty are marked loaded without
/// touching the file. The file is opened for this call only.
pub fn load_entry_data(path: Option<&Path>, entry: &mut Entry) -> Result<()> {
    if entry.is_loaded() || entry.size() == 0 {
        entry.set_loaded();
        return Ok(());
    }

    let Some(path) = path else {
        return Err(Error::NoBackingFile {
            name: entry.name().to_string(),
        });
    };
    let Some(offset) = stored_offset(entry) else {
        return Err(Error::NoStoredOffset {
            name: entry.name().to_string(),
        });
    };

    let mut file = File::open(path).map_err(|e| {
        tracing::error!("lib: failed to open {}: {}", path.display(), e);
        Error::Io(e)
    })?;
    file.seek(SeekFrom::Start(offset))?;
    let mut data = vec![0u8; entry.size() as usize];
    file.read_exact(&mut data)?;

    entry.fill_from_store(data);
    Ok(())
}

/// Payload offset recorded for `entry`, if one was read or written.
pub fn stored_offset(entry: &Entry) -> Option<u64> {
    entry
        .prop(OFFSET_PROP)
        .and_then(PropValue::as_int)
        .and_then(|v| u64::try_from(v).ok())
}

impl Archive {
    /// Load the payload of entry `index` from the archive's backing file.
    pub fn load_entry_data(&mut self, index: usize) -> Result<()> {
        let path = self.filename().map(Path::to_path_buf);
        let entry = self
            .entries_mut()
            .get_mut(index)
            .ok_or(Error::EntryNotFound { index })?;
        load_entry_data(path.as_deref(), entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::write_footer;

    struct Untyped;

    impl TypeDetector for Untyped {
        fn name(&self) -> &'static str {
            "untyped"
        }

        fn detect(&self, _entry: &mut Entry) {}
    }

    #[derive(Default)]
    struct Recorder {
        messages: Vec<String>,
        fractions: Vec<f32>,
    }

    impl ProgressSink for Recorder {
        fn set_message(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }

        fn set_progress(&mut self, fraction: f32) {
            self.fractions.push(fraction);
        }
    }

    fn image(records: &[(&str, u32, u32)], payload: &[u8]) -> Vec<u8> {
        let mut data = payload.to_vec();
        for &(name, size, offset) in records {
            DirRecord::new(name, size, offset).write_to(&mut data).unwrap();
        }
        write_footer(&mut data, records.len() as u16).unwrap();
        data
    }

    #[test]
    fn empty_buffer_is_insufficient() {
        let mut archive = Archive::new();
        let err = Reader::new(&Untyped).open(&mut archive, &[]).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { len: 0 }));
        let err = Reader::new(&Untyped).open(&mut archive, &[1]).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { len: 1 }));
    }

    #[test]
    fn oversized_count_is_corrupt() {
        let mut archive = Archive::new();
        let err = Reader::new(&Untyped)
            .open(&mut archive, &[0, 0, 0, 9, 0])
            .unwrap_err();
        assert!(matches!(err, Error::CorruptDirectory { .. }));
        assert!(archive.is_empty());
    }

    #[test]
    fn empty_archive_opens() {
        let mut archive = Archive::new();
        Reader::new(&Untyped).open(&mut archive, &[0, 0]).unwrap();
        assert!(archive.is_empty());
        assert!(!archive.is_modified());
    }

    #[test]
    fn progress_is_monotonic_and_cleared() {
        let payload = b"0123456789";
        let data = image(&[("A.TXT", 4, 0), ("B.TXT", 6, 4), ("C.TXT", 0, 0)], payload);

        let mut recorder = Recorder::default();
        let mut archive = Archive::new();
        Reader::new(&Untyped)
            .with_progress(&mut recorder)
            .open(&mut archive, &data)
            .unwrap();

        assert_eq!(
            recorder.messages,
            vec![
                "Reading archive data",
                "Detecting entry types",
                "Detecting structures",
                ""
            ]
        );
        assert_eq!(recorder.fractions.len(), 3 + 3 + 1);
        assert!(recorder.fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(recorder.fractions.iter().all(|f| (0.0..=1.0).contains(f)));
        assert_eq!(recorder.fractions.last(), Some(&1.0));
    }

    #[test]
    fn stored_offset_requires_a_valid_prop() {
        let mut e = Entry::new("A.TXT", 3);
        assert_eq!(stored_offset(&e), None);
        e.set_prop(OFFSET_PROP, PropValue::Int(-5));
        assert_eq!(stored_offset(&e), None);
        e.set_prop(OFFSET_PROP, PropValue::Int(77));
        assert_eq!(stored_offset(&e), Some(77));
    }

    #[test]
    fn unloaded_entry_without_offset_is_not_read() {
        let mut e = Entry::new("ADDED.DAT", 3);
        let err = load_entry_data(Some(Path::new("/nonexistent/file.lib")), &mut e).unwrap_err();
        assert!(matches!(err, Error::NoStoredOffset { .. }), "{err}");
        assert!(!e.is_loaded());
    }

    #[test]
    fn unloaded_entry_without_backing_file() {
        let mut e = Entry::new("A.TXT", 3);
        let err = load_entry_data(None, &mut e).unwrap_err();
        assert!(matches!(err, Error::NoBackingFile { .. }));
        assert!(!e.is_loaded());
    }

    #[test]
    fn zero_size_entry_loads_without_io() {
        let mut e = Entry::new("EMPTY", 0);
        load_entry_data(Some(Path::new("/nonexistent/file.lib")), &mut e).unwrap();
        assert!(e.is_loaded());
        assert_eq!(e.data(), Some(&[][..]));
    }
}
