//! The caller-owned dependency tracker the loader reports into.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Receives every dependency path the loader examines.
///
/// The tracker is owned by the caller and outlives the load. The loader only
/// ever writes serially, but implementations must tolerate being shared by
/// reference across the loader's components.
pub trait DependencyTracker {
    /// Records one examined dependency. `is_system` is set iff the path is
    /// SDK-relative.
    fn add_dependency(&self, path: &Path, is_system: bool);

    /// Whether the caller wants system (SDK) dependencies tracked at all.
    ///
    /// Sub-invocations inherit this setting.
    fn tracks_system_dependencies(&self) -> bool {
        false
    }
}

/// A dependency recorded by a [`CollectingTracker`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedDependency {
    /// The reported path, exactly as the loader saw it.
    pub path: PathBuf,
    /// Whether the dependency was SDK-relative.
    pub is_system: bool,
}

/// A tracker that accumulates reported dependencies in memory.
///
/// Useful in tests and tooling that wants to observe what a load touched.
#[derive(Default)]
pub struct CollectingTracker {
    entries: Mutex<Vec<TrackedDependency>>,
    track_system: bool,
}

impl CollectingTracker {
    /// Creates a tracker that does not request system-dependency tracking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker that requests system-dependency tracking.
    pub fn with_system_tracking() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            track_system: true,
        }
    }

    /// Returns a snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<TrackedDependency> {
        self.entries.lock().unwrap().clone()
    }
}

impl DependencyTracker for CollectingTracker {
    fn add_dependency(&self, path: &Path, is_system: bool) {
        self.entries.lock().unwrap().push(TrackedDependency {
            path: path.to_path_buf(),
            is_system,
        });
    }

    fn tracks_system_dependencies(&self) -> bool {
        self.track_system
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let tracker = CollectingTracker::new();
        tracker.add_dependency(Path::new("/a"), false);
        tracker.add_dependency(Path::new("/sdk/b"), true);

        let entries = tracker.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, PathBuf::from("/a"));
        assert!(!entries[0].is_system);
        assert!(entries[1].is_system);
    }

    #[test]
    fn system_tracking_flag() {
        assert!(!CollectingTracker::new().tracks_system_dependencies());
        assert!(CollectingTracker::with_system_tracking().tracks_system_dependencies());
    }
}
