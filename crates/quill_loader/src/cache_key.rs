//! Cache key derivation for built module interfaces.
//!
//! The key captures invocation *identity* only: which toolchain, which
//! interface (by path, not content), which architecture, which SDK, and
//! whether system dependencies are tracked. Interface edits and dependency
//! changes deliberately reuse the same cache slot and are caught by the
//! freshness check instead, so the cache holds one entry per distinct
//! configuration rather than one per rebuild.

use crate::invocation::SubInvocation;
use crate::BINARY_MODULE_EXTENSION;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh64::Xxh64;

/// Computes the cache key for a sub-invocation.
///
/// The combination is order-sensitive and stable across runs: fields are fed
/// length-prefixed into a streaming xxHash64, and the digest is rendered in
/// base-36.
pub fn cache_key(invocation: &SubInvocation) -> String {
    let mut hasher = Xxh64::new(0);
    mix(&mut hasher, invocation.toolchain_version.as_bytes());
    mix(&mut hasher, invocation.primary_input.as_os_str().as_encoded_bytes());
    mix(&mut hasher, invocation.target_arch().as_bytes());
    mix(&mut hasher, invocation.sdk_path.as_os_str().as_encoded_bytes());
    mix(&mut hasher, &[invocation.track_system_deps as u8]);
    to_base36(hasher.digest())
}

/// Composes the output filename for a module within the user cache:
/// `<cache_dir>/<module_name>-<key>.<binary module extension>`.
pub fn cached_output_path(
    cache_dir: &Path,
    module_name: &str,
    invocation: &SubInvocation,
) -> PathBuf {
    cache_dir.join(format!(
        "{module_name}-{}.{BINARY_MODULE_EXTENSION}",
        cache_key(invocation)
    ))
}

fn mix(hasher: &mut Xxh64, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    // 64 bits never need more than 13 base-36 digits.
    let mut buf = [0u8; 13];
    let mut at = buf.len();
    while value > 0 {
        at -= 1;
        buf[at] = DIGITS[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8_lossy(&buf[at..]).into_owned()
}
