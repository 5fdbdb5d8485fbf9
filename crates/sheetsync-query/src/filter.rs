//! Filter requests.
//!
//! A request maps field names to the values a row may take for that field.
//! Values for one field are alternatives (`IN`); separate fields must all
//! match (`AND`). Field names here are still unchecked user input; they are
//! resolved against an [`AllowedFieldSet`](crate::AllowedFieldSet) when the
//! request is executed.

use std::collections::BTreeMap;

/// Field → accepted values.
///
/// # Example
///
/// ```
/// use sheetsync_query::FilterRequest;
///
/// let request = FilterRequest::from_pairs([
///     ("state", "Delhi,Haryana"),
///     ("CITY", "Gurgaon"),
/// ]);
/// assert_eq!(request.values("STATE"), Some(&["Delhi".to_string(), "Haryana".to_string()][..]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRequest {
    fields: BTreeMap<String, Vec<String>>,
}

impl FilterRequest {
    /// Creates an empty request, which matches every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a request from query-string style pairs.
    ///
    /// Repeated keys accumulate, each value is split on commas, and blank
    /// values are dropped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::new();
        for (key, value) in pairs {
            request.push(key.as_ref(), value.as_ref());
        }
        request
    }

    /// Adds a comma-separated list of values for `field`.
    pub fn push(&mut self, field: &str, values: &str) {
        let entry = self
            .fields
            .entry(field.trim().to_uppercase())
            .or_default();
        for value in values.split(',').map(str::trim) {
            if !value.is_empty() && !entry.iter().any(|v| v == value) {
                entry.push(value.to_string());
            }
        }
    }

    /// Adds values for `field` without splitting them.
    #[must_use]
    pub fn with<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .fields
            .entry(field.trim().to_uppercase())
            .or_default();
        for value in values {
            let value = value.into();
            if !value.trim().is_empty() && !entry.contains(&value) {
                entry.push(value);
            }
        }
        self
    }

    /// Returns the values requested for `field`.
    #[must_use]
    pub fn values(&self, field: &str) -> Option<&[String]> {
        self.fields
            .get(&field.trim().to_uppercase())
            .map(Vec::as_slice)
    }

    /// Iterates over every requested field, including fields whose values
    /// were all blank.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, values)| (field.as_str(), values.as_slice()))
    }

    /// Returns whether the request names no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields named.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for FilterRequest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_keys_accumulate() {
        let request = FilterRequest::from_pairs([
            ("STATE", "Delhi"),
            ("STATE", "Haryana"),
            ("CITY", "Gurgaon"),
        ]);

        assert_eq!(request.len(), 2);
        assert_eq!(request.values("STATE").unwrap(), ["Delhi", "Haryana"]);
        assert_eq!(request.values("CITY").unwrap(), ["Gurgaon"]);
    }

    #[test]
    fn test_commas_split_and_blanks_drop() {
        let request = FilterRequest::from_pairs([("STATE", "Delhi, Haryana,,  ,Delhi")]);
        assert_eq!(request.values("STATE").unwrap(), ["Delhi", "Haryana"]);
    }

    #[test]
    fn test_keys_are_normalized() {
        let request = FilterRequest::from_pairs([(" state ", "Delhi"), ("State", "Goa")]);
        assert_eq!(request.len(), 1);
        assert_eq!(request.values("STATE").unwrap(), ["Delhi", "Goa"]);
    }

    #[test]
    fn test_blank_only_field_is_kept() {
        // The key must still be validated even though it filters nothing.
        let request = FilterRequest::from_pairs([("PASSWORD", "")]);
        assert!(!request.is_empty());
        assert_eq!(request.values("PASSWORD").unwrap(), [] as [String; 0]);
    }

    #[test]
    fn test_with_keeps_commas() {
        let request = FilterRequest::new().with("CUSTOMER_NAME", ["Smith, John"]);
        assert_eq!(request.values("CUSTOMER_NAME").unwrap(), ["Smith, John"]);
    }

    #[test]
    fn test_collect_from_iterator() {
        let request: FilterRequest = vec![("ZONE", "North")].into_iter().collect();
        assert_eq!(request.iter().collect::<Vec<_>>(), [("ZONE", &["North".to_string()][..])]);
    }

    #[test]
    fn test_empty_request() {
        let request = FilterRequest::new();
        assert!(request.is_empty());
        assert!(request.values("STATE").is_none());
    }
}
