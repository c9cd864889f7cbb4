//! Shared foundational types used across the Quill toolchain.
//!
//! This crate provides the content hashing primitive used by the module
//! caches for dependency verification and artifact invalidation.

#![warn(missing_docs)]

pub mod hash;

pub use hash::ContentHash;
