//! # StringPool
//!
//! An append-only interning table for the repeated text fields of citizen
//! records (names, places, address parts, e-mail addresses).
//!
//! Each distinct string is stored once and addressed by a `u32` index equal to
//! its insertion order. Records carry indices instead of text, which keeps the
//! record layout fixed-width.
//!
//! ## Key properties
//! - **Bijective**: one string, one index. Interning an existing string returns
//!   the index it was first given.
//! - **Append-only**: indices are assigned sequentially from 0 and are never
//!   reused or removed.
//! - **Compact encoding**: `count (u32 LE)` then, per string in index order,
//!   `len (u32 LE) | utf-8 bytes`.
//!
//! ## Example
//! ```rust
//! use strpool::StringPool;
//!
//! let mut pool = StringPool::new();
//! let juan = pool.intern("Juan");
//! assert_eq!(pool.intern("Juan"), juan);
//! assert_eq!(pool.resolve(juan).unwrap(), "Juan");
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Upper bound on how many entries are pre-allocated from an untrusted count.
const MAX_PREALLOC: usize = 1 << 16;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool index {index} out of range (pool size {size})")]
    OutOfRange { index: u32, size: usize },
    #[error("pool truncated: entry {entry} declares {declared} bytes, {available} available")]
    Truncated {
        entry: u32,
        declared: u32,
        available: usize,
    },
    #[error("pool truncated before the length of entry {entry}")]
    MissingLength { entry: u32 },
    #[error("pool entry {entry} is not valid utf-8")]
    InvalidUtf8 { entry: u32 },
    #[error("pool entry {entry} duplicates entry {first}")]
    Duplicate { entry: u32, first: u32 },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Interned strings addressed by insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StringPool {
    strings: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl StringPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `value`, appending it first if it is new.
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.lookup.get(value) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(value.to_owned());
        self.lookup.insert(value.to_owned(), idx);
        idx
    }

    /// Returns the string stored at `index`.
    ///
    /// # Errors
    ///
    /// [`PoolError::OutOfRange`] if `index >= self.len()`.
    pub fn resolve(&self, index: u32) -> Result<&str, PoolError> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(PoolError::OutOfRange {
                index,
                size: self.strings.len(),
            })
    }

    /// Returns the index of `value` without interning it.
    pub fn lookup(&self, value: &str) -> Option<u32> {
        self.lookup.get(value).copied()
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Strings in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Writes the pool as `count | (len | bytes)*`, all integers little-endian.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.strings.len() as u32)?;
        for s in &self.strings {
            w.write_u32::<LittleEndian>(s.len() as u32)?;
            w.write_all(s.as_bytes())?;
        }
        Ok(())
    }

    /// Encoded size in bytes of [`write_to`](Self::write_to)'s output.
    pub fn encoded_len(&self) -> usize {
        4 + self.strings.iter().map(|s| 4 + s.len()).sum::<usize>()
    }

    /// Rebuilds a pool from the encoding produced by [`write_to`](Self::write_to).
    ///
    /// Entries are read through a bounded `take`, so a corrupt length prefix
    /// surfaces as [`PoolError::Truncated`] instead of a huge allocation.
    ///
    /// # Errors
    ///
    /// Fails on short input, invalid UTF-8, or a repeated entry (which would
    /// break the one-string-one-index mapping).
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, PoolError> {
        let count = r.read_u32::<LittleEndian>()?;
        let cap = (count as usize).min(MAX_PREALLOC);
        let mut strings = Vec::with_capacity(cap);
        let mut lookup = HashMap::with_capacity(cap);

        for entry in 0..count {
            let declared = r.read_u32::<LittleEndian>().map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    PoolError::MissingLength { entry }
                } else {
                    PoolError::Io(e)
                }
            })?;

            let mut bytes = Vec::new();
            r.by_ref().take(declared as u64).read_to_end(&mut bytes)?;
            if bytes.len() != declared as usize {
                return Err(PoolError::Truncated {
                    entry,
                    declared,
                    available: bytes.len(),
                });
            }

            let s = String::from_utf8(bytes).map_err(|_| PoolError::InvalidUtf8 { entry })?;
            if let Some(&first) = lookup.get(&s) {
                return Err(PoolError::Duplicate { entry, first });
            }
            lookup.insert(s.clone(), entry);
            strings.push(s);
        }

        Ok(Self { strings, lookup })
    }
}
