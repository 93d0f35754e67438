use std::collections::BTreeMap;

/// Modification state of an entry, as seen by the editor around the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryState {
    /// Matches what was last read from or written to disk.
    #[default]
    Unmodified,
    /// Edited since the last read or write.
    Modified,
    /// Added since the last read or write.
    New,
}

/// A tagged value stored in an entry's extensible property bag.
///
/// Formats keep their own per-entry metadata here instead of adding fields
/// to [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl PropValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// One named, sized unit of payload data.
///
/// `size` is authoritative while the entry is unloaded; once bytes are
/// attached it always equals `data.len()`.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    name: String,
    /// Name bytes as stored on disk, kept when they are not valid UTF-8 so a
    /// rewrite reproduces them exactly.
    raw_name: Option<Vec<u8>>,
    size: u32,
    data: Option<Vec<u8>>,
    state: EntryState,
    kind: Option<String>,
    props: BTreeMap<String, PropValue>,
}

impl Entry {
    /// Create an unloaded entry of `size` bytes whose payload still lives in
    /// the backing store.
    pub fn new(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            size,
            ..Self::default()
        }
    }

    /// Create an unloaded entry from the raw name bytes of a directory record.
    pub(crate) fn from_stored_name(name: &[u8], size: u32) -> Self {
        match std::str::from_utf8(name) {
            Ok(s) => Self::new(s, size),
            Err(_) => Self {
                name: String::from_utf8_lossy(name).into_owned(),
                raw_name: Some(name.to_vec()),
                size,
                ..Self::default()
            },
        }
    }

    /// Create a loaded entry from in-memory bytes, marked [`EntryState::New`].
    ///
    /// Payloads larger than `u32::MAX` cannot be described by a directory
    /// record; the recorded size saturates and the writer rejects the entry.
    pub fn with_data(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: saturating_size(&data),
            data: Some(data),
            state: EntryState::New,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name bytes to store on disk: the original bytes for a name read from a
    /// record that was not valid UTF-8, otherwise the UTF-8 of [`Entry::name`].
    pub fn name_bytes(&self) -> &[u8] {
        self.raw_name.as_deref().unwrap_or(self.name.as_bytes())
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.raw_name = None;
        self.touch();
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Mark a zero-size entry loaded with an empty payload.
    pub(crate) fn set_loaded(&mut self) {
        debug_assert!(self.data.is_some() || self.size == 0);
        if self.data.is_none() {
            self.data = Some(Vec::new());
        }
    }

    /// Drop the in-memory payload, keeping the recorded size so it can be
    /// read back from the backing store later.
    pub fn unload(&mut self) {
        self.data = None;
    }

    /// Payload bytes, if loaded.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Replace the payload. Counts as an edit.
    pub fn import_data(&mut self, data: Vec<u8>) {
        self.size = saturating_size(&data);
        self.data = Some(data);
        self.touch();
    }

    /// Attach bytes read from the backing store. Not an edit.
    pub(crate) fn fill_from_store(&mut self, data: Vec<u8>) {
        debug_assert_eq!(data.len(), self.size as usize);
        self.data = Some(data);
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn set_state(&mut self, state: EntryState) {
        self.state = state;
    }

    /// Detected type name, e.g. `"wav"`, if a detector has run.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn set_kind(&mut self, kind: impl Into<String>) {
        self.kind = Some(kind.into());
    }

    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    pub fn set_prop(&mut self, key: impl Into<String>, value: PropValue) {
        self.props.insert(key.into(), value);
    }

    pub fn remove_prop(&mut self, key: &str) -> Option<PropValue> {
        self.props.remove(key)
    }

    fn touch(&mut self) {
        if self.state == EntryState::Unmodified {
            self.state = EntryState::Modified;
        }
    }
}

fn saturating_size(data: &[u8]) -> u32 {
    u32::try_from(data.len()).unwrap_or(u32::MAX)
}

#[cfg(test)]
impl Entry {
    /// Record a size that disagrees with the payload, as a payload past
    /// `u32::MAX` bytes would, without allocating one.
    pub(crate) fn with_recorded_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }
}
