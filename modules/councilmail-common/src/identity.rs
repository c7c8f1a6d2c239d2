//! Identity keys for person records.
//!
//! A key is the name field followed by the council field, trimmed once as a
//! whole. No case folding or inner whitespace normalization: keys must come
//! out byte-identical across runs and across sources.

use crate::types::{ExternalRecord, PersonRecord};

// Field precedence table: source field names for each column, highest first.
pub const COUNCILLOR_FIELDS: &[&str] = &["councillor", "name"];
pub const COUNCIL_NAME_FIELDS: &[&str] = &["council_name", "council"];
pub const COUNCIL_WEBSITE_FIELDS: &[&str] = &["council_website", "council_url"];
pub const POSITION_FIELDS: &[&str] = &["position"];
pub const WARD_FIELDS: &[&str] = &["ward"];
pub const EMAIL_FIELDS: &[&str] = &["email"];

/// Anything exposing a person's name and council.
pub trait Keyed {
    fn name_field(&self) -> &str;
    fn council_field(&self) -> &str;
}

impl Keyed for PersonRecord {
    fn name_field(&self) -> &str {
        &self.councillor
    }

    fn council_field(&self) -> &str {
        &self.council_name
    }
}

impl Keyed for ExternalRecord {
    fn name_field(&self) -> &str {
        self.first_of(COUNCILLOR_FIELDS)
    }

    fn council_field(&self) -> &str {
        self.first_of(COUNCIL_NAME_FIELDS)
    }
}

pub fn identity_key<R: Keyed + ?Sized>(record: &R) -> String {
    let mut key = String::with_capacity(record.name_field().len() + record.council_field().len());
    key.push_str(record.name_field());
    key.push_str(record.council_field());
    key.trim().to_string()
}
