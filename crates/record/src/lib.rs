//! # Record
//!
//! The fixed-width binary form of one citizen record.
//!
//! Text fields are not stored inline: each is a `u32` index into the
//! [`StringPool`](../strpool/struct.StringPool.html) the record was built with.
//! That keeps every record exactly [`RECORD_SIZE`] bytes.
//!
//! ## Layout (55 bytes, integers little-endian)
//!
//! ```text
//! offset size field
//!      0    8 identifier            ASCII
//!      8    4 given_names           pool index
//!     12    4 family_names          pool index
//!     16    4 birthplace            pool index
//!     20    4 address.region        pool index
//!     24    4 address.subregion     pool index
//!     28    4 address.city          pool index
//!     32    4 address.district      pool index
//!     36    4 address.location      pool index
//!     40    8 phone                 u64
//!     48    4 email                 pool index
//!     52    2 country_code          raw bytes
//!     54    1 flags                 bit 3 = sex, bits 0-2 = marital status
//! ```
//!
//! Pool indices are not bounds-checked here; that happens when they are
//! resolved against a pool.

mod identifier;

pub use identifier::{Identifier, IDENTIFIER_LEN};

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Encoded size of a [`CitizenRecord`].
pub const RECORD_SIZE: usize = 55;

const SEX_BIT: u8 = 1 << 3;
const MARITAL_MASK: u8 = 0b0000_0111;
const RESERVED_MASK: u8 = !(SEX_BIT | MARITAL_MASK);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record truncated: need 55 bytes, {available} available")]
    Truncated { available: usize },
    #[error("invalid sex code {0}")]
    InvalidSex(u8),
    #[error("invalid marital status code {0}")]
    InvalidMaritalStatus(u8),
    #[error("reserved flag bits set: {0:#04x}")]
    ReservedFlagBits(u8),
    #[error("invalid identifier {0:?}: expected 8 ascii bytes")]
    InvalidIdentifier(String),
    #[error("invalid country code {0:?}: expected 2 ascii bytes")]
    InvalidCountryCode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sex {
    #[default]
    Male = 0,
    Female = 1,
}

impl TryFrom<u8> for Sex {
    type Error = RecordError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Male),
            1 => Ok(Self::Female),
            other => Err(RecordError::InvalidSex(other)),
        }
    }
}

/// Civil status, stored in the low three bits of the flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaritalStatus {
    #[default]
    Single = 0,
    Married = 1,
    Divorced = 2,
    Widowed = 3,
    Cohabiting = 4,
}

impl MaritalStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MaritalStatus {
    type Error = RecordError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Single),
            1 => Ok(Self::Married),
            2 => Ok(Self::Divorced),
            3 => Ok(Self::Widowed),
            4 => Ok(Self::Cohabiting),
            other => Err(RecordError::InvalidMaritalStatus(other)),
        }
    }
}

/// Pool indices of the five address components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address {
    pub region: u32,
    pub subregion: u32,
    pub city: u32,
    pub district: u32,
    pub location: u32,
}

/// One citizen, with text fields as pool indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CitizenRecord {
    pub id: Identifier,
    pub given_names: u32,
    pub family_names: u32,
    pub birthplace: u32,
    pub address: Address,
    pub phone: u64,
    pub email: u32,
    pub country: [u8; 2],
    pub sex: Sex,
    pub marital_status: MaritalStatus,
}

impl CitizenRecord {
    /// A record with the given identifier and every other field zeroed.
    pub fn with_id(id: Identifier) -> Self {
        Self {
            id,
            given_names: 0,
            family_names: 0,
            birthplace: 0,
            address: Address::default(),
            phone: 0,
            email: 0,
            country: *b"  ",
            sex: Sex::default(),
            marital_status: MaritalStatus::default(),
        }
    }

    pub fn flags(&self) -> u8 {
        let sex = match self.sex {
            Sex::Male => 0,
            Sex::Female => SEX_BIT,
        };
        sex | self.marital_status.code()
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..8].copy_from_slice(self.id.as_bytes());
        LittleEndian::write_u32(&mut buf[8..12], self.given_names);
        LittleEndian::write_u32(&mut buf[12..16], self.family_names);
        LittleEndian::write_u32(&mut buf[16..20], self.birthplace);
        LittleEndian::write_u32(&mut buf[20..24], self.address.region);
        LittleEndian::write_u32(&mut buf[24..28], self.address.subregion);
        LittleEndian::write_u32(&mut buf[28..32], self.address.city);
        LittleEndian::write_u32(&mut buf[32..36], self.address.district);
        LittleEndian::write_u32(&mut buf[36..40], self.address.location);
        LittleEndian::write_u64(&mut buf[40..48], self.phone);
        LittleEndian::write_u32(&mut buf[48..52], self.email);
        buf[52..54].copy_from_slice(&self.country);
        buf[54] = self.flags();
        buf
    }

    /// Decodes the first [`RECORD_SIZE`] bytes of `bytes`; anything after is ignored.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Truncated`] if fewer than 55 bytes are available.
    /// - [`RecordError::InvalidMaritalStatus`] for codes 5-7.
    /// - [`RecordError::ReservedFlagBits`] if bits 4-7 of the flag byte are set.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < RECORD_SIZE {
            return Err(RecordError::Truncated {
                available: bytes.len(),
            });
        }
        let buf = &bytes[..RECORD_SIZE];

        let flags = buf[54];
        if flags & RESERVED_MASK != 0 {
            return Err(RecordError::ReservedFlagBits(flags));
        }
        let sex = if flags & SEX_BIT != 0 {
            Sex::Female
        } else {
            Sex::Male
        };
        let marital_status = MaritalStatus::try_from(flags & MARITAL_MASK)?;

        let mut id = [0u8; IDENTIFIER_LEN];
        id.copy_from_slice(&buf[0..8]);

        Ok(Self {
            id: Identifier::new(id),
            given_names: LittleEndian::read_u32(&buf[8..12]),
            family_names: LittleEndian::read_u32(&buf[12..16]),
            birthplace: LittleEndian::read_u32(&buf[16..20]),
            address: Address {
                region: LittleEndian::read_u32(&buf[20..24]),
                subregion: LittleEndian::read_u32(&buf[24..28]),
                city: LittleEndian::read_u32(&buf[28..32]),
                district: LittleEndian::read_u32(&buf[32..36]),
                location: LittleEndian::read_u32(&buf[36..40]),
            },
            phone: LittleEndian::read_u64(&buf[40..48]),
            email: LittleEndian::read_u32(&buf[48..52]),
            country: [buf[52], buf[53]],
            sex,
            marital_status,
        })
    }

    /// Every pool index the record references, in layout order.
    pub fn pool_indices(&self) -> [u32; 9] {
        [
            self.given_names,
            self.family_names,
            self.birthplace,
            self.address.region,
            self.address.subregion,
            self.address.city,
            self.address.district,
            self.address.location,
            self.email,
        ]
    }
}

/// Parses a two-letter country code.
pub fn parse_country(s: &str) -> Result<[u8; 2], RecordError> {
    match s.as_bytes() {
        [a, b] if a.is_ascii() && b.is_ascii() => Ok([*a, *b]),
        _ => Err(RecordError::InvalidCountryCode(s.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CitizenRecord {
        CitizenRecord {
            id: "30000000".parse().unwrap(),
            given_names: 1,
            family_names: 2,
            birthplace: 3,
            address: Address {
                region: 4,
                subregion: 5,
                city: 6,
                district: 7,
                location: 8,
            },
            phone: 987_654_321,
            email: 9,
            country: *b"PE",
            sex: Sex::Female,
            marital_status: MaritalStatus::Married,
        }
    }

    // -------------------- Layout --------------------

    #[test]
    fn encode_places_fields_at_documented_offsets() {
        let buf = sample().encode();
        assert_eq!(buf.len(), RECORD_SIZE);
        assert_eq!(&buf[0..8], b"30000000");
        assert_eq!(&buf[8..12], &[1, 0, 0, 0]);
        assert_eq!(&buf[12..16], &[2, 0, 0, 0]);
        assert_eq!(&buf[16..20], &[3, 0, 0, 0]);
        assert_eq!(&buf[20..24], &[4, 0, 0, 0]);
        assert_eq!(&buf[36..40], &[8, 0, 0, 0]);
        assert_eq!(&buf[40..48], &987_654_321u64.to_le_bytes());
        assert_eq!(&buf[48..52], &[9, 0, 0, 0]);
        assert_eq!(&buf[52..54], b"PE");
        assert_eq!(buf[54], 0b0000_1001);
    }

    #[test]
    fn decode_reverses_encode() {
        let rec = sample();
        assert_eq!(CitizenRecord::decode(&rec.encode()).unwrap(), rec);
    }

    #[test]
    fn decode_ignores_bytes_past_the_record() {
        let rec = sample();
        let mut buf = rec.encode().to_vec();
        buf.extend_from_slice(&[0xAA; 10]);
        assert_eq!(CitizenRecord::decode(&buf).unwrap(), rec);
    }

    // -------------------- Flags --------------------

    #[test]
    fn flag_byte_packs_sex_and_status() {
        let mut rec = sample();
        rec.sex = Sex::Male;
        rec.marital_status = MaritalStatus::Single;
        assert_eq!(rec.flags(), 0);
        rec.sex = Sex::Female;
        rec.marital_status = MaritalStatus::Cohabiting;
        assert_eq!(rec.flags(), 0b0000_1100);
    }

    #[test]
    fn every_marital_status_survives() {
        for code in 0..=4u8 {
            let mut rec = sample();
            rec.marital_status = MaritalStatus::try_from(code).unwrap();
            let back = CitizenRecord::decode(&rec.encode()).unwrap();
            assert_eq!(back.marital_status.code(), code);
        }
    }

    #[test]
    fn undefined_marital_status_is_rejected() {
        let mut buf = sample().encode();
        for code in 5..=7u8 {
            buf[54] = code;
            assert_eq!(
                CitizenRecord::decode(&buf),
                Err(RecordError::InvalidMaritalStatus(code))
            );
        }
    }

    #[test]
    fn reserved_bits_are_rejected() {
        let mut buf = sample().encode();
        buf[54] = 0b0001_0000;
        assert_eq!(
            CitizenRecord::decode(&buf),
            Err(RecordError::ReservedFlagBits(0b0001_0000))
        );
    }

    // -------------------- Errors --------------------

    #[test]
    fn decode_short_input() {
        let buf = sample().encode();
        assert_eq!(
            CitizenRecord::decode(&buf[..54]),
            Err(RecordError::Truncated { available: 54 })
        );
        assert_eq!(
            CitizenRecord::decode(&[]),
            Err(RecordError::Truncated { available: 0 })
        );
    }

    #[test]
    fn decode_does_not_check_pool_bounds() {
        let mut rec = sample();
        rec.email = u32::MAX;
        assert_eq!(CitizenRecord::decode(&rec.encode()).unwrap().email, u32::MAX);
    }

    #[test]
    fn sex_codes() {
        assert_eq!(Sex::try_from(0), Ok(Sex::Male));
        assert_eq!(Sex::try_from(1), Ok(Sex::Female));
        assert_eq!(Sex::try_from(2), Err(RecordError::InvalidSex(2)));
    }

    #[test]
    fn country_code_parsing() {
        assert_eq!(parse_country("PE").unwrap(), *b"PE");
        assert!(parse_country("PER").is_err());
        assert!(parse_country("P").is_err());
        assert!(parse_country("ñ").is_err());
    }

    #[test]
    fn pool_indices_in_layout_order() {
        assert_eq!(sample().pool_indices(), [1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }
}
