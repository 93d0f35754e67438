pub mod archive;
pub mod codec;
pub mod detect;
pub mod entry;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

pub use archive::{Archive, ArchiveEvent, SignalBlocker};
pub use codec::{NoProgress, ProgressSink, TypeDetector};
pub use detect::{is_lib_archive, is_lib_file, DetectOptions};
pub use entry::{Entry, EntryState, PropValue};
pub use error::{Error, Result};
pub use reader::{load_entry_data, Reader};
pub use writer::Writer;
