use std::io;

use btree::BTreeError;
use record::RecordError;
use strpool::PoolError;
use thiserror::Error;

use crate::frame::FrameError;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("snapshot truncated at byte {offset} while reading {what}")]
    Truncated { offset: usize, what: &'static str },
    #[error("node at byte {offset} declares {key_count} keys, allowed 0..={max}")]
    InvalidNodeHeader {
        offset: usize,
        key_count: i32,
        max: usize,
    },
    #[error("node at byte {offset} has leaf flag {value}, expected 0 or 1")]
    InvalidLeafFlag { offset: usize, value: u8 },
    #[error("bad record at byte {offset}: {source}")]
    Record {
        offset: usize,
        #[source]
        source: RecordError,
    },
    #[error("string pool: {0}")]
    Pool(#[from] PoolError),
    #[error("tree structure: {0}")]
    Tree(#[from] BTreeError),
    #[error("{0} unexpected bytes after the string pool")]
    TrailingBytes(usize),
}
