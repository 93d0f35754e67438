use std::path::Path;

use crate::archive::Archive;
use crate::entry::{EntryState, PropValue};
use crate::error::{Error, Result};
use crate::format::{write_footer, DirRecord, FOOTER_SIZE, MAX_ENTRIES, OFFSET_PROP, RECORD_SIZE};

/// Serializes an [`Archive`] into a LIB image.
///
/// # Layout written
/// ```text
/// [PAYLOAD 0] [PAYLOAD 1] ... [PAYLOAD N-1]   ← packed from offset 0
/// [DIRECTORY: 21 bytes × N]
/// [FOOTER: 2 bytes, u16 LE entry count]
/// ```
///
/// Payloads are always repacked contiguously in container order; offsets
/// read from the original file are discarded.
#[derive(Debug, Clone, Copy)]
pub struct Writer {
    update: bool,
}

impl Default for Writer {
    fn default() -> Self {
        Self { update: true }
    }
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// With `update` (the default) every entry is marked unmodified after the
    /// write. Without it, entry states are left alone, which suits exporting a
    /// copy of an archive that is still being edited.
    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// Serialize `archive` to a new buffer.
    ///
    /// Unloaded entries are loaded from the archive's backing file first,
    /// before any stored offset is rewritten.
    pub fn write(&self, archive: &mut Archive) -> Result<Vec<u8>> {
        let count = archive.len();
        if count > MAX_ENTRIES {
            tracing::warn!("lib: refusing to write {} entries", count);
            return Err(Error::TooManyEntries { count });
        }

        for index in 0..count {
            archive.load_entry_data(index)?;
        }

        // ── Assign offsets ─────────────────────────────────────────────────
        let mut records = Vec::with_capacity(count);
        let mut payload_len: u64 = 0;
        for entry in archive.entries() {
            if let Some(data) = entry.data() {
                if data.len() != entry.size() as usize {
                    return Err(Error::EntryTooLarge {
                        name: entry.name().to_string(),
                        len: data.len() as u64,
                    });
                }
            }
            let offset = u32::try_from(payload_len)
                .map_err(|_| Error::ArchiveTooLarge { size: payload_len })?;
            records.push(DirRecord::new(entry.name_bytes(), entry.size(), offset));
            payload_len += u64::from(entry.size());
        }
        for (entry, rec) in archive.entries_mut().iter_mut().zip(&records) {
            entry.set_prop(OFFSET_PROP, PropValue::Int(i64::from(rec.offset)));
        }

        let total = FOOTER_SIZE + payload_len + count as u64 * RECORD_SIZE;
        let mut out = Vec::with_capacity(total as usize);

        // ── Payloads ───────────────────────────────────────────────────────
        for entry in archive.entries() {
            out.extend_from_slice(entry.data().unwrap_or_default());
        }

        // ── Directory ──────────────────────────────────────────────────────
        for rec in &records {
            rec.write_to(&mut out)?;
        }
        if self.update {
            for entry in archive.entries_mut() {
                entry.set_state(EntryState::Unmodified);
            }
        }

        // ── Footer ─────────────────────────────────────────────────────────
        write_footer(&mut out, count as u16)?;
        debug_assert_eq!(out.len() as u64, total);

        tracing::debug!(
            "lib: wrote {} entries, {} payload bytes, {} total",
            count,
            payload_len,
            out.len()
        );
        Ok(out)
    }

    /// Serialize `archive` to `path`. With update semantics the file becomes
    /// the archive's backing file and the archive is marked unmodified.
    pub fn write_file(&self, archive: &mut Archive, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self.write(archive)?;
        std::fs::write(path, &data)?;
        if self.update {
            archive.set_filename(path);
            archive.set_modified(false);
        }
        Ok(())
    }
}
