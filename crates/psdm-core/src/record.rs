//! Raw, untyped records as delivered by a source adapter.
//!
//! Field names are matched case- and separator-insensitively, so `v_rated`,
//! `vRated` and `V-RATED` address the same field. Keys are normalized once
//! on construction.

use std::collections::BTreeMap;

use crate::EntityKind;

/// Normalize a field name: lowercase, without `_`, `-` or whitespace.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One raw row/document: a kind tag plus field name → raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    kind: EntityKind,
    fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new<K, V, I>(kind: EntityKind, fields: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (normalize_key(key.as_ref()), value.into()))
            .collect();
        Self { kind, fields }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Raw value of a field (any spelling of the name).
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(&normalize_key(field)).map(String::as_str)
    }

    /// Whether the record carries the (already normalized) field name.
    pub fn contains(&self, normalized: &str) -> bool {
        self.fields.contains_key(normalized)
    }

    /// Normalized field names, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Add or replace a field.
    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(normalize_key(field), value.into());
    }

    /// Short label for log lines: the record's `uuid` or `id` if present.
    pub fn label(&self) -> String {
        self.get("uuid")
            .or_else(|| self.get("id"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("<{} without uuid>", self.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_spellings_collapse() {
        assert_eq!(normalize_key("v_rated"), "vrated");
        assert_eq!(normalize_key("vRated"), "vrated");
        assert_eq!(normalize_key(" V-RATED "), "vrated");
    }

    #[test]
    fn test_lookup_is_spelling_insensitive() {
        let record = RawRecord::new(EntityKind::Node, [("v_rated", "20"), ("ID", "n1")]);
        assert_eq!(record.get("vRated"), Some("20"));
        assert_eq!(record.get("id"), Some("n1"));
        assert!(record.contains("vrated"));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["id", "vrated"]);
    }

    #[test]
    fn test_label_falls_back() {
        let record = RawRecord::new(EntityKind::Line, [("id", "l1")]);
        assert_eq!(record.label(), "l1");
        let empty = RawRecord::new(EntityKind::Line, Vec::<(&str, &str)>::new());
        assert!(empty.is_empty());
        assert_eq!(empty.label(), "<line without uuid>");
    }
}
