use slib_core::{Entry, TypeDetector};

/// Payload signatures, checked in order against the start of the data.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"MThd", "midi"),
    (b"Creative Voice File\x1a", "voc"),
    (b"GIF8", "gif"),
];

/// Signature-sniffing detector.
///
/// Checks the payload for a handful of well-known signatures (PNG, MIDI,
/// VOC, GIF, RIFF/WAVE). Entries with no bytes are typed `marker`. Anything
/// else falls back to the lowercase name extension, or `data` when there is
/// none.
#[derive(Default)]
pub struct MagicDetector;

impl MagicDetector {
    pub fn new() -> Self {
        Self
    }

    fn sniff(data: &[u8]) -> Option<&'static str> {
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
            return Some("wav");
        }
        SIGNATURES
            .iter()
            .find(|(sig, _)| data.starts_with(sig))
            .map(|&(_, kind)| kind)
    }
}

impl TypeDetector for MagicDetector {
    fn name(&self) -> &'static str {
        "magic"
    }

    fn detect(&self, entry: &mut Entry) {
        let data = entry.data().unwrap_or_default();
        if data.is_empty() {
            entry.set_kind("marker");
            return;
        }
        if let Some(kind) = Self::sniff(data) {
            entry.set_kind(kind);
            return;
        }
        let kind = match entry.name().rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => "data".to_string(),
        };
        entry.set_kind(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(name: &str, data: &[u8]) -> String {
        let mut entry = Entry::with_data(name, data.to_vec());
        MagicDetector.detect(&mut entry);
        entry.kind().unwrap_or_default().to_string()
    }

    #[test]
    fn sniffs_signatures_before_extension() {
        assert_eq!(kind_of("SONG.DAT", b"MThd\0\0\0\x06"), "midi");
        assert_eq!(kind_of("X.BIN", b"RIFF\x24\0\0\0WAVEfmt "), "wav");
        assert_eq!(kind_of("P", b"\x89PNG\r\n\x1a\n\0\0"), "png");
    }

    #[test]
    fn falls_back_to_extension() {
        assert_eq!(kind_of("WALL01.IMG", b"\x01\x02\x03"), "img");
        assert_eq!(kind_of("NOEXT", b"\x01"), "data");
        assert_eq!(kind_of(".HIDDEN", b"\x01"), "data");
    }

    #[test]
    fn empty_entries_are_markers() {
        assert_eq!(kind_of("MAP01", b""), "marker");
        let mut unloaded = Entry::new("MAP02", 0);
        MagicDetector.detect(&mut unloaded);
        assert_eq!(unloaded.kind(), Some("marker"));
    }
}
