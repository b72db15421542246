//! Defaults for the citizen index service and the `civic` binary.
//!
//! These are compile-time constants; runtime overrides come from the command
//! line in `main.rs` and end up in an [`EngineConfig`].

use record::{MaritalStatus, Sex};

/// Default B-tree minimum degree `t`.
///
/// Nodes hold `t-1..=2t-1` records, so at `t = 30` a node is at most
/// 59 × 55 bytes of payload.
pub const DEFAULT_ORDER: usize = 30;

/// Default zstd level for snapshot files.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 1;

/// Snapshot file used when `--snapshot` is not given.
pub const DEFAULT_SNAPSHOT_PATH: &str = "citizens.bin";

/// Log directives applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVES: &str = "cli=info,snapshot=info";

/// Field separator of ingested lines.
pub const FIELD_DELIMITER: char = ',';

/// Fields of a legacy line:
/// `id, given_names, family_names, birthplace, region, subregion, city,
/// district, location, email`.
pub const LEGACY_FIELD_COUNT: usize = 10;

/// Fields of a full line: the legacy ten, then
/// `phone, country_code, sex, marital_status`.
pub const FULL_FIELD_COUNT: usize = 14;

/// Phone number given to legacy lines.
pub const LEGACY_PHONE: u64 = 987_654_321;

/// Country code given to legacy lines.
pub const LEGACY_COUNTRY: [u8; 2] = *b"PE";

pub const LEGACY_SEX: Sex = Sex::Male;

pub const LEGACY_MARITAL_STATUS: MaritalStatus = MaritalStatus::Single;

/// Runtime settings of an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// B-tree minimum degree; also used to decode snapshots.
    pub order: usize,
    /// zstd level for snapshot files.
    pub compression_level: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}
