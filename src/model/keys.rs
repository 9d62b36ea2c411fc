//! Key/value collections for HTTP messages.
//!
//! Three collection shapes exist and the distinction is load-bearing:
//! headers are insertion-ordered and case-insensitive by name, path and
//! query parameters are multi-valued with unique case-sensitive names,
//! and cookies are single-valued. Collapsing the multi-valued/
//! single-valued asymmetry breaks the template contract.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::Serialize;

// ============================================================================
// Headers
// ============================================================================

/// HTTP header multi-map.
///
/// Names are case-insensitive for lookup and equality but the first-seen
/// spelling is kept for output. Insertion order is preserved and is part
/// of the canonical wire form.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Headers {
    entries: IndexMap<String, Vec<String>>,
}

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no headers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Appends a value to the named header, creating it if absent.
    ///
    /// Lookup is case-insensitive; the first-seen name spelling wins.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.values_mut(&name) {
            existing.push(value);
        } else {
            self.entries.insert(name, vec![value]);
        }
    }

    /// Replaces all values of the named header.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        if let Some(existing) = self.values_mut(&name) {
            *existing = values;
        } else {
            self.entries.insert(name, values);
        }
    }

    /// Returns the ordered values of the named header, case-insensitively.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Returns `true` when the named header exists, case-insensitively.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values(name).is_some()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    fn values_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
    }
}

impl FromIterator<(String, Vec<String>)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, values) in iter {
            headers.insert(name, values);
        }
        headers
    }
}

impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        // Name order is a serialization concern, not an identity one.
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(name, values)| other.values(name) == Some(values.as_slice()))
    }
}

impl Eq for Headers {}

impl Hash for Headers {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash in a name-sorted, lowercased order so equal maps with
        // different insertion orders hash identically.
        let mut entries: Vec<(String, &Vec<String>)> = self
            .entries
            .iter()
            .map(|(name, values)| (name.to_ascii_lowercase(), values))
            .collect();
        entries.sort();
        for (name, values) in entries {
            name.hash(state);
            values.hash(state);
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Path or query-string parameter multi-map.
///
/// Names are unique and case-sensitive; values are ordered. Equality is
/// order-insensitive across names and the canonical form serializes in
/// key-sorted order, so a `BTreeMap` is the natural backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Parameters {
    entries: BTreeMap<String, Vec<String>>,
}

impl Parameters {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct parameter names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Appends a value to the named parameter.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(name.into()).or_default().push(value.into());
    }

    /// Replaces all values of the named parameter.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.entries.insert(name.into(), values);
    }

    /// Returns the ordered values of the named parameter.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Iterates entries in key-sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

impl FromIterator<(String, Vec<String>)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Cookies
// ============================================================================

/// Cookie map: one scalar value per name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cookies {
    entries: BTreeMap<String, String>,
}

impl Cookies {
    /// Creates an empty cookie map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no cookies are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sets the named cookie, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Returns the scalar value of the named cookie.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Iterates entries in key-sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl FromIterator<(String, String)> for Cookies {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_case_insensitive_lookup() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "application/json");
        assert_eq!(
            headers.values("content-type"),
            Some(&["application/json".to_string()][..])
        );
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_headers_first_spelling_wins() {
        let mut headers = Headers::new();
        headers.add("X-Trace", "a");
        headers.add("x-trace", "b");
        let entries: Vec<_> = headers.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "X-Trace");
        assert_eq!(entries[0].1, &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_headers_preserve_insertion_order() {
        let mut headers = Headers::new();
        headers.add("Zebra", "1");
        headers.add("Alpha", "2");
        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Zebra", "Alpha"]);
    }

    #[test]
    fn test_headers_equality_ignores_order_and_case() {
        let mut a = Headers::new();
        a.add("One", "1");
        a.add("Two", "2");
        let mut b = Headers::new();
        b.add("two", "2");
        b.add("ONE", "1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_headers_equal_maps_hash_identically() {
        use std::collections::hash_map::DefaultHasher;

        let mut a = Headers::new();
        a.add("One", "1");
        a.add("Two", "2");
        let mut b = Headers::new();
        b.add("TWO", "2");
        b.add("one", "1");

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn test_parameters_multi_valued() {
        let mut params = Parameters::new();
        params.add("q", "1");
        params.add("q", "2");
        assert_eq!(
            params.values("q"),
            Some(&["1".to_string(), "2".to_string()][..])
        );
    }

    #[test]
    fn test_parameters_case_sensitive() {
        let mut params = Parameters::new();
        params.add("q", "1");
        assert!(params.values("Q").is_none());
    }

    #[test]
    fn test_parameters_iterate_sorted() {
        let mut params = Parameters::new();
        params.add("zulu", "1");
        params.add("alpha", "2");
        let names: Vec<_> = params.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "zulu"]);
    }

    #[test]
    fn test_cookies_single_valued() {
        let mut cookies = Cookies::new();
        cookies.insert("session", "abc");
        cookies.insert("session", "def");
        assert_eq!(cookies.value("session"), Some("def"));
        assert_eq!(cookies.len(), 1);
    }
}
