//! Header block text format
//!
//! Headers are persisted as a single text block: one `Name: value` pair per
//! line, sorted ascending by name. Names keep their case on write and are
//! matched case-insensitively on lookup. Lines without a `": "` separator are
//! dropped when decoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A set of HTTP header fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Create an empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing field with the same exact name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields in serialization order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize to the header block text format
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse a header block, silently dropping malformed lines
    pub fn decode(block: &str) -> Self {
        let fields = block
            .lines()
            .filter_map(|line| line.split_once(": "))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self(fields)
    }

    /// Consume into the underlying map
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for Headers {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Case-insensitive lookup directly on an encoded header block
pub fn header_value<'a>(block: &'a str, name: &str) -> Option<&'a str> {
    block
        .lines()
        .filter_map(|line| line.split_once(": "))
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("Content-Type".to_string(), "application/json".to_string());
        map.insert("X-Id".to_string(), "7".to_string());

        let block = Headers::from(map.clone()).encode();
        assert_eq!(block, "Content-Type: application/json\nX-Id: 7");

        let decoded = Headers::decode(&block);
        assert_eq!(decoded.into_map(), map);
    }

    #[test]
    fn test_malformed_line_dropped() {
        let decoded = Headers::decode("Accept: */*\ngarbage-without-separator\nHost: example.com");
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.get("host"), Some("example.com"));
    }

    #[test]
    fn test_sorted_on_encode() {
        let headers = Headers::new()
            .with("b-header", "2")
            .with("A-Header", "1")
            .with("Accept", "*/*");
        assert_eq!(headers.encode(), "A-Header: 1\nAccept: */*\nb-header: 2");
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let headers = Headers::new().with("Content-Type", "text/html");
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(headers.get("Accept"), None);

        let block = headers.encode();
        assert_eq!(header_value(&block, "content-TYPE"), Some("text/html"));
    }

    #[test]
    fn test_value_with_separator() {
        let decoded = Headers::decode("Link: <a>; rel=\"next\": weird");
        assert_eq!(decoded.get("link"), Some("<a>; rel=\"next\": weird"));
    }
}
