//! The on-disk container format for compiled binary modules.
//!
//! A serialized module starts with the `QMOD` magic, a 4-byte little-endian
//! header length, a bincode-encoded [`ModuleHeader`], and the opaque payload
//! produced by the frontend. The header embeds the module's dependency table
//! so freshness can be checked without consulting any sidecar metadata.

use crate::dependency::FileDependency;
use quill_common::ContentHash;
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a serialized binary module.
///
/// The magic sits at offset zero so the first bytes alone distinguish a
/// serialized module from a forwarding record.
pub const MODULE_MAGIC: [u8; 4] = *b"QMOD";

/// Current module container format version. Increment on breaking changes to
/// the header or payload framing.
pub const MODULE_FORMAT_VERSION: u32 = 1;

/// Header stored in every serialized binary module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleHeader {
    /// Container format version.
    pub format_version: u32,

    /// Toolchain version string that produced this module.
    pub toolchain_version: String,

    /// The name of the serialized module.
    pub module_name: String,

    /// Files this module was built from, for freshness validation.
    pub dependencies: Vec<FileDependency>,

    /// Content hash of the payload data (for corruption checks).
    pub checksum: ContentHash,
}

/// Failure to encode a module into its container format.
#[derive(Debug, thiserror::Error)]
#[error("failed to encode module header: {reason}")]
pub struct EncodeError {
    /// Description of the encoding failure.
    pub reason: String,
}

/// Returns `true` if the buffer begins with the serialized-module magic.
pub fn is_serialized_module(buf: &[u8]) -> bool {
    buf.starts_with(&MODULE_MAGIC)
}

/// Serializes a module payload with its dependency table into the container
/// format.
pub fn serialize_module(
    module_name: &str,
    toolchain_version: &str,
    dependencies: &[FileDependency],
    payload: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let header = ModuleHeader {
        format_version: MODULE_FORMAT_VERSION,
        toolchain_version: toolchain_version.to_string(),
        module_name: module_name.to_string(),
        dependencies: dependencies.to_vec(),
        checksum: ContentHash::from_bytes(payload),
    };

    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| EncodeError {
            reason: e.to_string(),
        })?;

    // Layout: magic + 4-byte header length (little-endian) + header + payload.
    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(MODULE_MAGIC.len() + 4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&MODULE_MAGIC);
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);
    Ok(output)
}

/// Validates a buffer as a serialized binary module, returning its header.
///
/// Returns `None` if the magic is absent, the header is truncated or
/// undecodable, the format version differs, or the payload checksum does not
/// verify. This is fail-safe: corruption reads as "not a module".
pub fn validate_serialized_module(buf: &[u8]) -> Option<ModuleHeader> {
    let rest = buf.strip_prefix(&MODULE_MAGIC)?;
    if rest.len() < 4 {
        return None;
    }

    let header_len = u32::from_le_bytes(rest[..4].try_into().ok()?) as usize;
    if rest.len() < 4 + header_len {
        return None;
    }

    let header: ModuleHeader =
        bincode::serde::decode_from_slice(&rest[4..4 + header_len], bincode::config::standard())
            .ok()?
            .0;

    if header.format_version != MODULE_FORMAT_VERSION {
        return None;
    }

    let payload = &rest[4 + header_len..];
    if ContentHash::from_bytes(payload) != header.checksum {
        return None;
    }

    Some(header)
}

/// Returns the payload bytes of a validated serialized module.
pub fn payload(buf: &[u8]) -> Option<&[u8]> {
    let rest = buf.strip_prefix(&MODULE_MAGIC)?;
    if rest.len() < 4 {
        return None;
    }
    let header_len = u32::from_le_bytes(rest[..4].try_into().ok()?) as usize;
    rest.get(4 + header_len..)
}
