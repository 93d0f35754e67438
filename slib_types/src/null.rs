use slib_core::{Entry, TypeDetector};

/// No-op detector: leaves every entry's type unset.
///
/// Useful for:
/// - Opening archives where only names and bytes matter (extract, repack).
/// - Verifying the container round-trip independently of any detector.
pub struct NullDetector;

impl TypeDetector for NullDetector {
    fn name(&self) -> &'static str {
        "none"
    }

    fn detect(&self, _entry: &mut Entry) {}
}
