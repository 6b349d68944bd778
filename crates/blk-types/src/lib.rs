//! Foundation types for the blockstore.
//!
//! This crate provides the identity types shared by every other crate in the
//! workspace. It performs no hashing and no I/O: digests are computed by
//! `blk-crypto`, and persistence lives in `blk-store`.
//!
//! # Key Types
//!
//! - [`Multihash`] -- Self-describing digest (algorithm code + length + hash bytes)
//! - [`HashCode`] -- Supported digest algorithms
//! - [`Extension`] -- Type tag distinguishing raw blocks from alternate encodings
//! - [`StorageKey`] -- Sharded, filesystem-safe identifier derived from a digest
//! - [`KeyInput`] -- Any form a caller may use to name a stored block

pub mod error;
pub mod extension;
pub mod key;
pub mod multihash;

pub use error::TypeError;
pub use extension::Extension;
pub use key::{decode_base32, encode_base32, KeyInput, ParsedKey, StorageKey, SHARD_PREFIX_LEN};
pub use multihash::{HashCode, Multihash};
