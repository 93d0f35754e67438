use crate::archive::Archive;
use crate::entry::Entry;

/// Entry type detection, supplied by whoever dispatches on payload types.
///
/// The reader calls [`detect`](TypeDetector::detect) once per entry after
/// its payload is in memory (zero-size entries are passed with an empty
/// payload), then [`detect_structures`](TypeDetector::detect_structures)
/// once over the whole archive. Anything a detector changes on an entry is
/// not treated as a user edit: the reader resets the entry state afterwards.
pub trait TypeDetector {
    /// Human-readable detector name for CLI display.
    fn name(&self) -> &'static str;

    /// Inspect one loaded entry and record its type.
    fn detect(&self, entry: &mut Entry);

    /// Group entries into higher-level structures (maps and the like).
    fn detect_structures(&self, _archive: &mut Archive) {}
}

/// Receiver for progress while an archive is opened.
///
/// Fractions passed to [`set_progress`](ProgressSink::set_progress) are in
/// `[0, 1]` and never decrease within one open.
pub trait ProgressSink {
    /// Phase label; an empty string means the operation is finished.
    fn set_message(&mut self, message: &str);

    fn set_progress(&mut self, fraction: f32);
}

impl<P: ProgressSink + ?Sized> ProgressSink for &mut P {
    fn set_message(&mut self, message: &str) {
        (**self).set_message(message);
    }

    fn set_progress(&mut self, fraction: f32) {
        (**self).set_progress(fraction);
    }
}

/// Progress sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_message(&mut self, _message: &str) {}

    fn set_progress(&mut self, _fraction: f32) {}
}
