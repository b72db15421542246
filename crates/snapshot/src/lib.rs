//! # Snapshot
//!
//! Whole-tree persistence for the citizen index.
//!
//! A snapshot is the tree encoded node by node in pre-order, immediately
//! followed by the string pool. On disk the snapshot is wrapped in exactly one
//! zstd frame that declares its decompressed size, with no other header or
//! trailer.
//!
//! ## Snapshot layout (integers little-endian)
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │ NODE  key_count (i32) | is_leaf (u8: 0 or 1)          │
//! │       for i in 0..key_count:                          │
//! │           record i (55 bytes)                         │
//! │           child i (NODE, recursively, internal only)  │
//! │       child key_count (NODE, internal only)           │
//! ├───────────────────────────────────────────────────────┤
//! │ POOL  count (u32) | (len (u32) | utf-8 bytes)*        │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! The layout does not record the tree order `t`; the reader supplies it.
//!
//! ## File
//!
//! ```text
//! file = zstd_frame(content_size, checksum, snapshot)
//! ```
//!
//! Files are written to `<path>.tmp`, fsynced and renamed over `<path>`, so a
//! failed save never leaves a half-written snapshot under the final name.

mod error;
pub mod format;
pub mod frame;
mod reader;
mod registry;
mod writer;

pub use error::SnapshotError;
pub use frame::FrameError;
pub use reader::SnapshotReader;
pub use registry::{AddressView, CitizenView, Registry};
pub use strpool::PoolError;
pub use writer::SnapshotWriter;
