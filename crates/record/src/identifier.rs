use std::fmt;
use std::str::FromStr;

use crate::RecordError;

/// Length in bytes of an [`Identifier`].
pub const IDENTIFIER_LEN: usize = 8;

/// Fixed 8-byte national identifier.
///
/// Ordering is plain byte-wise comparison. Identifiers are codes, not numbers:
/// `"1000000A"` sorts after `"10000009"` because `'A'` is above `'9'` in ASCII.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier([u8; IDENTIFIER_LEN]);

impl Identifier {
    pub const fn new(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LEN] {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = RecordError;

    /// Accepts exactly eight ASCII bytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != IDENTIFIER_LEN || !bytes.is_ascii() {
            return Err(RecordError::InvalidIdentifier(s.to_owned()));
        }
        let mut id = [0u8; IDENTIFIER_LEN];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }
}

impl From<[u8; IDENTIFIER_LEN]> for Identifier {
    fn from(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier(\"{}\")", self)
    }
}
