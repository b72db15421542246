use std::path::Path;

use btree::{BTree, BTreeError};
use record::{CitizenRecord, Identifier, MaritalStatus, Sex};
use strpool::{PoolError, StringPool};

use crate::{format, SnapshotError, SnapshotReader, SnapshotWriter};

/// The citizen index: a tree of records and the pool their text fields point
/// into. The two are only ever persisted, loaded and replaced together.
#[derive(Debug, Clone)]
pub struct Registry {
    tree: BTree,
    pool: StringPool,
}

/// A record with every pool index replaced by its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitizenView {
    pub id: Identifier,
    pub given_names: String,
    pub family_names: String,
    pub birthplace: String,
    pub address: AddressView,
    pub phone: u64,
    pub email: String,
    pub country: String,
    pub sex: Sex,
    pub marital_status: MaritalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressView {
    pub region: String,
    pub subregion: String,
    pub city: String,
    pub district: String,
    pub location: String,
}

impl Registry {
    /// An empty registry whose tree has minimum degree `order`.
    pub fn new(order: usize) -> Result<Self, BTreeError> {
        Ok(Self::from_parts(BTree::new(order)?, StringPool::new()))
    }

    pub fn from_parts(tree: BTree, pool: StringPool) -> Self {
        Self { tree, pool }
    }

    pub fn into_parts(self) -> (BTree, StringPool) {
        (self.tree, self.pool)
    }

    pub fn tree(&self) -> &BTree {
        &self.tree
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    pub fn order(&self) -> usize {
        self.tree.order()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn insert(&mut self, record: CitizenRecord) {
        self.tree.insert(record);
    }

    /// Inserts `record` only if every pool index it carries exists in this
    /// registry's pool.
    pub fn try_insert(&mut self, record: CitizenRecord) -> Result<(), PoolError> {
        let size = self.pool.len();
        if let Some(&index) = record.pool_indices().iter().find(|&&i| i as usize >= size) {
            return Err(PoolError::OutOfRange { index, size });
        }
        self.tree.insert(record);
        Ok(())
    }

    pub fn intern(&mut self, value: &str) -> u32 {
        self.pool.intern(value)
    }

    pub fn resolve(&self, index: u32) -> Result<&str, PoolError> {
        self.pool.resolve(index)
    }

    /// First record with identifier `id`, if any.
    pub fn search(&self, id: &Identifier) -> Option<&CitizenRecord> {
        self.tree.search(id)
    }

    /// Resolves every text field of `record` against this registry's pool.
    pub fn resolve_record(&self, record: &CitizenRecord) -> Result<CitizenView, PoolError> {
        let text = |index: u32| self.pool.resolve(index).map(str::to_owned);
        Ok(CitizenView {
            id: record.id,
            given_names: text(record.given_names)?,
            family_names: text(record.family_names)?,
            birthplace: text(record.birthplace)?,
            address: AddressView {
                region: text(record.address.region)?,
                subregion: text(record.address.subregion)?,
                city: text(record.address.city)?,
                district: text(record.address.district)?,
                location: text(record.address.location)?,
            },
            phone: record.phone,
            email: text(record.email)?,
            country: String::from_utf8_lossy(&record.country).into_owned(),
            sex: record.sex,
            marital_status: record.marital_status,
        })
    }

    /// Exact encoded size of [`encode`](Self::encode)'s output.
    pub fn encoded_len(&self) -> usize {
        format::encoded_tree_len(&self.tree) + self.pool.encoded_len()
    }

    /// The unframed snapshot: tree in pre-order, then the pool.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        format::encode_tree(&self.tree, &mut buf)?;
        self.pool.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Rebuilds a registry from [`encode`](Self::encode)'s output.
    ///
    /// The whole buffer must be consumed; leftover bytes after the pool are
    /// reported as [`SnapshotError::TrailingBytes`].
    pub fn decode(bytes: &[u8], order: usize) -> Result<Self, SnapshotError> {
        let mut input = bytes;
        let tree = format::decode_tree(&mut input, order)?;
        let pool = StringPool::read_from(&mut input)?;
        if !input.is_empty() {
            return Err(SnapshotError::TrailingBytes(input.len()));
        }
        Ok(Self { tree, pool })
    }

    /// Encodes, compresses and atomically writes the registry to `path`.
    /// Returns the number of bytes written.
    pub fn write_snapshot_file(&self, path: &Path, level: i32) -> Result<u64, SnapshotError> {
        SnapshotWriter::new(path, level).write(&self.encode()?)
    }

    /// Loads a registry previously written with
    /// [`write_snapshot_file`](Self::write_snapshot_file).
    pub fn read_snapshot_file(path: &Path, order: usize) -> Result<Self, SnapshotError> {
        SnapshotReader::open(path)?.into_registry(order)
    }
}
