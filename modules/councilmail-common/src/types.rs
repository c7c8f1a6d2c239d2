use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::{
    COUNCILLOR_FIELDS, COUNCIL_NAME_FIELDS, COUNCIL_WEBSITE_FIELDS, EMAIL_FIELDS, POSITION_FIELDS,
    WARD_FIELDS,
};

/// Persisted `email` value for a row that was searched and has no address.
/// Distinct from the empty string, which means the row was never attempted.
pub const NO_EMAIL_SENTINEL: &str = "none";

// --- Person records ---

/// One row of the councillor directory. Field order matches the storage schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub councillor: String,
    pub position: String,
    pub council_name: String,
    pub ward: String,
    pub council_website: String,
    pub email: String,
}

impl PersonRecord {
    /// True once the row holds an address or the "none" sentinel.
    /// Whitespace alone is not an address: such a row is still unattempted.
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }

    /// Normalize a loosely-typed source row into the storage shape.
    /// Email is carried over verbatim when present.
    pub fn from_external(record: &ExternalRecord) -> Self {
        Self {
            councillor: record.first_of(COUNCILLOR_FIELDS).to_string(),
            position: record.first_of(POSITION_FIELDS).to_string(),
            council_name: record.first_of(COUNCIL_NAME_FIELDS).to_string(),
            ward: record.first_of(WARD_FIELDS).to_string(),
            council_website: record.first_of(COUNCIL_WEBSITE_FIELDS).to_string(),
            email: record.first_of(EMAIL_FIELDS).to_string(),
        }
    }
}

/// A row from an external dataset. Field names vary between sources
/// (`name` vs `councillor`, `council` vs `council_name`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalRecord(pub Map<String, Value>);

impl ExternalRecord {
    /// String value of a field. Non-string JSON values count as missing.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// First non-empty value among `names`, in precedence order; `""` if none.
    pub fn first_of(&self, names: &[&str]) -> &str {
        names
            .iter()
            .filter_map(|name| self.field(name))
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }
}

impl From<Value> for ExternalRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

// --- Search ---

/// One item from a search response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    /// Snippet text, already rendered from markup.
    pub snippet: String,
    /// Set when the result is a document (PDF, DOC, ...) rather than a web page.
    pub file_format: Option<String>,
}

/// What the search collaborator returned for a query that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResponse {
    Hits(Vec<SearchHit>),
    /// Structurally empty response. Usually an exhausted quota.
    NoResults,
}

// --- Outcomes ---

/// Per-run classification of what happened to one row.
/// Returned alongside the row, never stored on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ExistingEmail,
    NoCouncillorName,
    NoCouncilWebsite,
    ErrorDuringSearch,
    NoSearchResults,
    NoEmailFound,
    Email(String),
    /// Closest candidate by edit distance when nothing contained the name.
    NoMatchingEmail(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::ExistingEmail => "existing-email",
            Outcome::NoCouncillorName => "no-councillor-name",
            Outcome::NoCouncilWebsite => "no-council-website",
            Outcome::ErrorDuringSearch => "error-during-search",
            Outcome::NoSearchResults => "no-search-results",
            Outcome::NoEmailFound => "no-email-found",
            Outcome::Email(_) => "email",
            Outcome::NoMatchingEmail(_) => "no-matching-email",
        }
    }

    /// The value the row's `email` column takes after this outcome.
    /// `None` leaves the column untouched.
    pub fn persisted_email(&self) -> Option<&str> {
        match self {
            Outcome::NoEmailFound => Some(NO_EMAIL_SENTINEL),
            Outcome::Email(email) | Outcome::NoMatchingEmail(email) => Some(email),
            _ => None,
        }
    }

    /// Whether reaching this outcome cost a search request.
    pub fn searched(&self) -> bool {
        !matches!(
            self,
            Outcome::ExistingEmail | Outcome::NoCouncillorName | Outcome::NoCouncilWebsite
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Email(email) | Outcome::NoMatchingEmail(email) => {
                write!(f, "{} ({})", self.label(), email)
            }
            _ => f.write_str(self.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn external(value: Value) -> ExternalRecord {
        ExternalRecord::from(value)
    }

    #[test]
    fn normalizes_alternate_field_names() {
        let record = external(json!({
            "name": "Jane Smith",
            "council": "Springfield City Council",
            "council_url": "https://springfield.gov.au/",
            "ward": "North",
        }));

        let person = PersonRecord::from_external(&record);
        assert_eq!(person.councillor, "Jane Smith");
        assert_eq!(person.council_name, "Springfield City Council");
        assert_eq!(person.council_website, "https://springfield.gov.au/");
        assert_eq!(person.ward, "North");
        assert_eq!(person.email, "");
    }

    #[test]
    fn preferred_field_wins_over_fallback() {
        let record = external(json!({
            "councillor": "Jane Smith",
            "name": "J. Smith",
        }));
        assert_eq!(record.first_of(COUNCILLOR_FIELDS), "Jane Smith");
    }

    #[test]
    fn empty_preferred_field_falls_back() {
        let record = external(json!({ "councillor": "", "name": "J. Smith" }));
        assert_eq!(record.first_of(COUNCILLOR_FIELDS), "J. Smith");
    }

    #[test]
    fn non_string_values_count_as_missing() {
        let record = external(json!({ "councillor": 42, "email": null }));
        assert_eq!(record.first_of(COUNCILLOR_FIELDS), "");
        assert_eq!(PersonRecord::from_external(&record).email, "");
    }

    #[test]
    fn email_is_carried_verbatim() {
        let record = external(json!({ "email": " Jane@Council.gov.au " }));
        assert_eq!(PersonRecord::from_external(&record).email, " Jane@Council.gov.au ");
    }

    #[test]
    fn non_object_rows_become_empty_records() {
        assert_eq!(external(json!("oops")), ExternalRecord::default());
    }

    #[test]
    fn sentinel_counts_as_having_email() {
        let person = PersonRecord {
            email: NO_EMAIL_SENTINEL.to_string(),
            ..Default::default()
        };
        assert!(person.has_email());
        assert!(!PersonRecord::default().has_email());
    }

    #[test]
    fn whitespace_only_email_counts_as_unattempted() {
        let person = PersonRecord {
            email: " \t ".to_string(),
            ..Default::default()
        };
        assert!(!person.has_email());
    }

    #[test]
    fn outcome_email_persistence() {
        assert_eq!(Outcome::NoEmailFound.persisted_email(), Some("none"));
        assert_eq!(
            Outcome::Email("a@b.com".into()).persisted_email(),
            Some("a@b.com")
        );
        assert_eq!(
            Outcome::NoMatchingEmail("a@b.com".into()).persisted_email(),
            Some("a@b.com")
        );
        assert_eq!(Outcome::ErrorDuringSearch.persisted_email(), None);
        assert_eq!(Outcome::NoSearchResults.persisted_email(), None);
        assert_eq!(Outcome::ExistingEmail.persisted_email(), None);
    }

    #[test]
    fn only_prechecks_skip_the_search() {
        assert!(!Outcome::ExistingEmail.searched());
        assert!(!Outcome::NoCouncilWebsite.searched());
        assert!(Outcome::ErrorDuringSearch.searched());
        assert!(Outcome::NoEmailFound.searched());
    }
}
