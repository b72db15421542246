//! Comma-delimited citizen lines to records.
//!
//! A line is parsed completely before anything is interned, so a rejected
//! line never leaves strings behind in the pool.

use record::{parse_country, CitizenRecord, Identifier, MaritalStatus, Sex};
use snapshot::Registry;
use tracing::{debug, warn};

use crate::config::{
    FIELD_DELIMITER, FULL_FIELD_COUNT, LEGACY_COUNTRY, LEGACY_FIELD_COUNT, LEGACY_MARITAL_STATUS,
    LEGACY_PHONE, LEGACY_SEX,
};

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Why a line was not ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotUtf8,
    FieldCount(usize),
    Identifier,
    Phone,
    Country,
    Sex,
    MaritalStatus,
}

/// A validated line, text fields still borrowed from the input.
#[derive(Debug)]
pub struct ParsedLine<'a> {
    id: Identifier,
    /// given names, family names, birthplace, the five address parts, email
    text: [&'a str; 9],
    phone: u64,
    country: [u8; 2],
    sex: Sex,
    marital_status: MaritalStatus,
}

pub fn parse_line(line: &str) -> Result<ParsedLine<'_>, SkipReason> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() != LEGACY_FIELD_COUNT && fields.len() != FULL_FIELD_COUNT {
        return Err(SkipReason::FieldCount(fields.len()));
    }

    let id: Identifier = fields[0].parse().map_err(|_| SkipReason::Identifier)?;
    let mut text = [""; 9];
    text.copy_from_slice(&fields[1..LEGACY_FIELD_COUNT]);

    let mut parsed = ParsedLine {
        id,
        text,
        phone: LEGACY_PHONE,
        country: LEGACY_COUNTRY,
        sex: LEGACY_SEX,
        marital_status: LEGACY_MARITAL_STATUS,
    };
    if fields.len() == FULL_FIELD_COUNT {
        let extra = &fields[LEGACY_FIELD_COUNT..];
        parsed.phone = extra[0].parse().map_err(|_| SkipReason::Phone)?;
        parsed.country = parse_country(extra[1]).map_err(|_| SkipReason::Country)?;
        parsed.sex = extra[2]
            .parse::<u8>()
            .ok()
            .and_then(|c| Sex::try_from(c).ok())
            .ok_or(SkipReason::Sex)?;
        parsed.marital_status = extra[3]
            .parse::<u8>()
            .ok()
            .and_then(|c| MaritalStatus::try_from(c).ok())
            .ok_or(SkipReason::MaritalStatus)?;
    }
    Ok(parsed)
}

impl ParsedLine<'_> {
    /// Interns the text fields into `registry` and builds the record.
    pub fn into_record(self, registry: &mut Registry) -> CitizenRecord {
        let [given, family, birthplace, region, subregion, city, district, location, email] =
            self.text.map(|s| registry.intern(s));
        CitizenRecord {
            id: self.id,
            given_names: given,
            family_names: family,
            birthplace,
            address: record::Address {
                region,
                subregion,
                city,
                district,
                location,
            },
            phone: self.phone,
            email,
            country: self.country,
            sex: self.sex,
            marital_status: self.marital_status,
        }
    }
}

/// Inserts every valid line of `text` into `registry`.
///
/// Lines are separated by `\n` (a trailing `\r` is dropped). Blank lines are
/// ignored; any other line that fails to parse is counted in
/// [`IngestStats::skipped`].
pub fn ingest_lines(registry: &mut Registry, text: &[u8]) -> IngestStats {
    let mut stats = IngestStats::default();

    for (lineno, raw) in text.split(|b| *b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let parsed = std::str::from_utf8(raw)
            .map_err(|_| SkipReason::NotUtf8)
            .and_then(parse_line);
        match parsed {
            Ok(line) => {
                let record = line.into_record(registry);
                registry.insert(record);
                stats.inserted += 1;
            }
            Err(reason) => {
                debug!(line = lineno + 1, ?reason, "skipping line");
                stats.skipped += 1;
            }
        }
    }

    if stats.skipped > 0 {
        warn!(
            skipped = stats.skipped,
            inserted = stats.inserted,
            "lines skipped during ingestion"
        );
    }
    stats
}
