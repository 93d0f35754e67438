mod magic;
mod null;

pub use magic::MagicDetector;
pub use null::NullDetector;

use slib_core::TypeDetector;
use std::sync::Arc;

/// Names accepted by [`detector_by_name`].
pub const DETECTOR_NAMES: &[&str] = &["none", "magic"];

/// Resolve a bundled detector from its name.
///
/// Called by the CLI so `--detector` can pick how entry types are assigned.
pub fn detector_by_name(name: &str) -> anyhow::Result<Arc<dyn TypeDetector>> {
    match name {
        "none" | "null" => Ok(Arc::new(NullDetector)),
        "magic" | "auto" => Ok(Arc::new(MagicDetector)),
        other => anyhow::bail!(
            "unknown detector '{}'. Valid options: {}",
            other,
            DETECTOR_NAMES.join(", ")
        ),
    }
}
