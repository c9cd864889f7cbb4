//! Validation of recorded dependencies against the live filesystem.

use crate::dependency::{mod_time_ticks, DependencyVerifier, FileDependency};
use crate::tracker::DependencyTracker;
use quill_common::ContentHash;
use std::fs;
use std::path::Path;

/// Checks a module's recorded dependencies against the current filesystem.
///
/// All checks are fail-safe: a dependency that cannot be statted or read
/// counts as stale, never as an error, so a stale cache entry falls through
/// to the next discovery probe or a rebuild.
pub struct FreshnessChecker<'a> {
    sdk_path: &'a Path,
    tracker: Option<&'a dyn DependencyTracker>,
}

impl<'a> FreshnessChecker<'a> {
    /// Creates a checker resolving SDK-relative records against `sdk_path`.
    pub fn new(sdk_path: &'a Path, tracker: Option<&'a dyn DependencyTracker>) -> Self {
        Self { sdk_path, tracker }
    }

    /// Returns `true` iff every dependency matches the filesystem by size
    /// and by its recorded verifier.
    ///
    /// Every examined path is reported to the dependency tracker, tagged as
    /// a system dependency iff the record is SDK-relative.
    pub fn deps_up_to_date(&self, deps: &[FileDependency]) -> bool {
        for dep in deps {
            let full_path = dep.resolved_path(self.sdk_path);
            if let Some(tracker) = self.tracker {
                tracker.add_dependency(&full_path, dep.sdk_relative);
            }
            if !self.dep_is_up_to_date(dep, &full_path) {
                return false;
            }
        }
        true
    }

    fn dep_is_up_to_date(&self, dep: &FileDependency, full_path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(full_path) else {
            return false;
        };
        // A size change is definitive without looking any further.
        if metadata.len() != dep.size {
            return false;
        }
        match dep.verifier {
            DependencyVerifier::ModTime(recorded) => mod_time_ticks(&metadata) == recorded,
            DependencyVerifier::ContentHash(recorded) => match fs::read(full_path) {
                Ok(bytes) => ContentHash::from_bytes(&bytes) == recorded,
                Err(_) => false,
            },
        }
    }
}
