//! The entry container a LIB archive is read into and written from.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use crate::entry::{Entry, EntryState};
use crate::error::{Error, Result};

/// Change notifications delivered to the archive's listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    EntryAdded { index: usize },
    EntryRemoved { index: usize },
    EntryChanged { index: usize },
    Modified(bool),
}

type Listener = Box<dyn FnMut(&ArchiveEvent)>;

/// Ordered, mutable collection of entries plus the file they came from.
#[derive(Default)]
pub struct Archive {
    entries: Vec<Entry>,
    filename: Option<PathBuf>,
    modified: bool,
    /// Nesting depth of live [`SignalBlocker`]s.
    blocked: u32,
    listener: Option<Listener>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.entries)
            .field("filename", &self.filename)
            .field("modified", &self.modified)
            .field("blocked", &self.blocked)
            .finish_non_exhaustive()
    }
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// File the archive was opened from or last saved to.
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn set_filename(&mut self, path: impl Into<PathBuf>) {
        self.filename = Some(path.into());
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    /// Mutable access for edits. Marks the archive modified.
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut Entry> {
        if index >= self.entries.len() {
            return None;
        }
        self.set_modified(true);
        self.emit(ArchiveEvent::EntryChanged { index });
        self.entries.get_mut(index)
    }

    /// Mutable access that does not count as an edit, for codecs filling in
    /// state they own (stored offsets, loaded payloads, detected types).
    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    /// Append an entry and return its index.
    pub fn add_entry(&mut self, entry: Entry) -> usize {
        let index = self.entries.len();
        self.entries.push(entry);
        self.set_modified(true);
        self.emit(ArchiveEvent::EntryAdded { index });
        index
    }

    pub fn remove_entry(&mut self, index: usize) -> Result<Entry> {
        if index >= self.entries.len() {
            return Err(Error::EntryNotFound { index });
        }
        let entry = self.entries.remove(index);
        self.set_modified(true);
        self.emit(ArchiveEvent::EntryRemoved { index });
        Ok(entry)
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        if self.modified != modified {
            self.modified = modified;
            self.emit(ArchiveEvent::Modified(modified));
        }
    }

    /// Whether any entry differs from what is on disk.
    pub fn has_modified_entries(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.state() != EntryState::Unmodified)
    }

    /// Install the change listener, replacing any previous one.
    pub fn set_listener(&mut self, listener: impl FnMut(&ArchiveEvent) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    #[inline]
    pub fn signals_blocked(&self) -> bool {
        self.blocked > 0
    }

    /// Suspend change notifications until the returned guard is dropped.
    ///
    /// The guard derefs to the archive, so the bulk edit happens through it.
    pub fn block_signals(&mut self) -> SignalBlocker<'_> {
        self.blocked += 1;
        SignalBlocker { archive: self }
    }

    fn emit(&mut self, event: ArchiveEvent) {
        if self.blocked > 0 {
            return;
        }
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }
}

/// Scoped suspension of [`Archive`] change notifications.
///
/// Delivery resumes when the guard is dropped, including on early return
/// or unwinding.
pub struct SignalBlocker<'a> {
    archive: &'a mut Archive,
}

impl Deref for SignalBlocker<'_> {
    type Target = Archive;

    fn deref(&self) -> &Archive {
        self.archive
    }
}

impl DerefMut for SignalBlocker<'_> {
    fn deref_mut(&mut self) -> &mut Archive {
        self.archive
    }
}

impl Drop for SignalBlocker<'_> {
    fn drop(&mut self) {
        self.archive.blocked -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording(archive: &mut Archive) -> Rc<RefCell<Vec<ArchiveEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        archive.set_listener(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn add_entry_notifies_and_marks_modified() {
        let mut archive = Archive::new();
        let events = recording(&mut archive);
        archive.add_entry(Entry::new("A.TXT", 0));
        assert!(archive.is_modified());
        assert_eq!(
            *events.borrow(),
            vec![ArchiveEvent::Modified(true), ArchiveEvent::EntryAdded { index: 0 }]
        );
    }

    #[test]
    fn blocker_suppresses_then_resumes() {
        let mut archive = Archive::new();
        let events = recording(&mut archive);
        {
            let mut guard = archive.block_signals();
            guard.add_entry(Entry::new("A.TXT", 0));
            guard.add_entry(Entry::new("B.TXT", 0));
            assert!(guard.signals_blocked());
        }
        assert!(!archive.signals_blocked());
        assert!(events.borrow().is_empty());

        archive.add_entry(Entry::new("C.TXT", 0));
        assert_eq!(*events.borrow(), vec![ArchiveEvent::EntryAdded { index: 2 }]);
    }

    #[test]
    fn blocker_resumes_on_early_return() {
        fn fails(archive: &mut Archive) -> Result<()> {
            let mut guard = archive.block_signals();
            guard.add_entry(Entry::new("A.TXT", 0));
            Err(Error::corrupt("boom"))
        }

        let mut archive = Archive::new();
        assert!(fails(&mut archive).is_err());
        assert!(!archive.signals_blocked());
    }

    #[test]
    fn nested_blockers_count() {
        let mut archive = Archive::new();
        {
            let mut outer = archive.block_signals();
            {
                let inner = outer.block_signals();
                assert!(inner.signals_blocked());
            }
            assert!(outer.signals_blocked());
        }
        assert!(!archive.signals_blocked());
    }

    #[test]
    fn remove_out_of_range() {
        let mut archive = Archive::new();
        assert!(matches!(
            archive.remove_entry(3),
            Err(Error::EntryNotFound { index: 3 })
        ));
    }
}
