//! Versioned artifact persistence.

mod artifact_store;
mod clock;

pub use artifact_store::ArtifactStore;
pub use clock::{Clock, FixedClock, SystemClock};

/// `chrono` format of the timestamp embedded in versioned file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the directory holding the latest copy of every type.
pub const LATEST_DIR: &str = "latest";
