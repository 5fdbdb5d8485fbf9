//! Allow-listed column names.
//!
//! Column names are the only part of a query that cannot be bound as a
//! parameter. Every name that reaches SQL text goes through this module
//! first: it must look like a plain identifier and, for user-supplied names,
//! appear in a fixed allow-list.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{QueryError, Result};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern is valid"));

/// Returns whether `name` consists only of ASCII letters, digits and
/// underscores.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// A column or table name that passed validation.
///
/// Cannot be built from outside this crate, so query builders that take an
/// `AllowedField` never see raw user input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllowedField(String);

impl AllowedField {
    /// Checks a configured identifier.
    pub(crate) fn checked(name: &str) -> Result<Self> {
        let name = name.trim();
        if is_valid_identifier(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(QueryError::InvalidIdentifier(name.to_string()))
        }
    }

    /// Returns the name as spelled in the allow-list.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name quoted for use in SQL.
    #[must_use]
    pub fn quoted(&self) -> String {
        // Validated names contain no quote characters.
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for AllowedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fixed set of fields callers may name.
#[derive(Debug, Clone, Default)]
pub struct AllowedFieldSet {
    // Keyed by upper-cased name so lookups ignore case.
    fields: BTreeMap<String, AllowedField>,
}

impl AllowedFieldSet {
    /// Builds a set from configured names.
    ///
    /// Fails with [`QueryError::InvalidIdentifier`] if any name is not a
    /// plain identifier.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = BTreeMap::new();
        for name in names {
            let field = AllowedField::checked(name.as_ref())?;
            fields
                .entry(field.as_str().to_uppercase())
                .or_insert(field);
        }
        Ok(Self { fields })
    }

    /// Resolves a requested field name against the set.
    ///
    /// Matching ignores surrounding whitespace and case; the returned field
    /// carries the allow-list's own spelling.
    pub fn validate(&self, requested: &str) -> Result<AllowedField> {
        self.fields
            .get(&requested.trim().to_uppercase())
            .cloned()
            .ok_or_else(|| QueryError::InvalidFilterField(requested.to_string()))
    }

    /// Checks whether a field is allowed.
    #[must_use]
    pub fn contains(&self, requested: &str) -> bool {
        self.validate(requested).is_ok()
    }

    /// Returns the allowed fields, sorted.
    pub fn iter(&self) -> impl Iterator<Item = &AllowedField> {
        self.fields.values()
    }

    /// Returns the number of allowed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer_fields() -> AllowedFieldSet {
        AllowedFieldSet::new(["CUSTOMER_NAME", "STATE", "CITY", "T_ZONE"]).unwrap()
    }

    #[test]
    fn test_identifier_pattern() {
        assert!(is_valid_identifier("STATE"));
        assert!(is_valid_identifier("T_ZONE"));
        assert!(is_valid_identifier("col1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("STATE; DROP TABLE x"));
        assert!(!is_valid_identifier("STATE\""));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier("ÉTAT"));
    }

    #[test]
    fn test_validate_returns_allow_list_spelling() {
        let fields = customer_fields();
        assert_eq!(fields.validate("state").unwrap().as_str(), "STATE");
        assert_eq!(fields.validate("  City ").unwrap().as_str(), "CITY");
        assert_eq!(fields.validate("T_ZONE").unwrap().quoted(), "\"T_ZONE\"");
    }

    #[test]
    fn test_validate_rejects_unknown_fields() {
        let fields = customer_fields();
        for bad in ["PASSWORD", "STATE; DROP TABLE x", "", "STATE OR 1=1"] {
            let err = fields.validate(bad).unwrap_err();
            assert!(matches!(err, QueryError::InvalidFilterField(ref f) if f == bad));
        }
    }

    #[test]
    fn test_configured_names_must_be_identifiers() {
        let err = AllowedFieldSet::new(["STATE", "CITY NAME"]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier(ref f) if f == "CITY NAME"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let fields = AllowedFieldSet::new(["STATE", "state", "CITY"]).unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains("State"));
        assert!(!fields.is_empty());
    }
}
