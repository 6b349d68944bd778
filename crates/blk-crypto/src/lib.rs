//! Digest primitives for the blockstore.
//!
//! Wraps established hash libraries (`sha2`, `blake3`) and tags every result
//! with its algorithm code, producing a [`blk_types::Multihash`]. No custom
//! cryptography.

pub mod hasher;

pub use hasher::ContentHasher;
