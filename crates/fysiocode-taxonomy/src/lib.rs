pub mod tables;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use tables::{LOCATIONS, PATHOLOGIES};

/// A resolved entry from the code table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeEntry {
    /// Full 4-digit code.
    pub code: String,
    /// Location segment description (first two digits).
    pub location: String,
    /// Pathology segment description (last two digits).
    pub pathology: String,
}

impl CodeEntry {
    /// Human-readable name, e.g. "Knie - tendinopathie".
    pub fn display_name(&self) -> String {
        let mut pathology = self.pathology.clone();
        if let Some(first) = pathology.get(0..1) {
            pathology.replace_range(0..1, &first.to_lowercase());
        }
        format!("{} - {}", self.location, pathology)
    }
}

/// Lookup over the fixed location/pathology segment tables.
///
/// Built once at startup and shared read-only; no interior mutability.
#[derive(Debug, Clone)]
pub struct CodeTable {
    locations: HashMap<&'static str, &'static str>,
    pathologies: HashMap<&'static str, &'static str>,
}

impl Default for CodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeTable {
    pub fn new() -> Self {
        Self {
            locations: tables::LOCATIONS.iter().copied().collect(),
            pathologies: tables::PATHOLOGIES.iter().copied().collect(),
        }
    }

    /// Format check only: exactly four ASCII digits.
    pub fn is_wellformed(code: &str) -> bool {
        code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit())
    }

    /// Split a well-formed code into (location, pathology) segments.
    pub fn split(code: &str) -> Option<(&str, &str)> {
        if !Self::is_wellformed(code) {
            return None;
        }
        Some((&code[0..2], &code[2..4]))
    }

    pub fn location_name(&self, segment: &str) -> Option<&'static str> {
        self.locations.get(segment).copied()
    }

    pub fn pathology_name(&self, segment: &str) -> Option<&'static str> {
        self.pathologies.get(segment).copied()
    }

    /// Both segments must exist for a code to be known.
    pub fn exists(&self, code: &str) -> bool {
        self.lookup(code).is_some()
    }

    pub fn lookup(&self, code: &str) -> Option<CodeEntry> {
        let (loc, pat) = Self::split(code)?;
        let location = self.location_name(loc)?;
        let pathology = self.pathology_name(pat)?;
        Some(CodeEntry {
            code: code.to_string(),
            location: location.to_string(),
            pathology: pathology.to_string(),
        })
    }

    /// Compose a code from two known segments.
    pub fn compose(&self, location: &str, pathology: &str) -> Option<CodeEntry> {
        self.lookup(&format!("{location}{pathology}"))
    }

    /// Human-readable name for a known code.
    pub fn display_name(&self, code: &str) -> Option<String> {
        self.lookup(code).map(|e| e.display_name())
    }

    /// All location segments in table order, for prompt digests.
    pub fn locations(&self) -> &'static [(&'static str, &'static str)] {
        tables::LOCATIONS
    }

    /// All pathology segments in table order, for prompt digests.
    pub fn pathologies(&self) -> &'static [(&'static str, &'static str)] {
        tables::PATHOLOGIES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wellformed_accepts_four_digits_only() {
        assert!(CodeTable::is_wellformed("7920"));
        assert!(!CodeTable::is_wellformed("792"));
        assert!(!CodeTable::is_wellformed("79201"));
        assert!(!CodeTable::is_wellformed("79a0"));
        assert!(!CodeTable::is_wellformed(""));
        // Multi-byte input must not panic the byte-indexed split.
        assert!(!CodeTable::is_wellformed("79²0"));
    }

    #[test]
    fn lookup_known_code() {
        let table = CodeTable::new();
        let entry = table.lookup("7920").unwrap();
        assert_eq!(entry.location, "Knie");
        assert_eq!(entry.pathology, "Tendinopathie");
        assert_eq!(entry.display_name(), "Knie - tendinopathie");
    }

    #[test]
    fn lookup_unknown_segment_fails() {
        let table = CodeTable::new();
        // 99 is not a location segment; 20 is a valid pathology.
        assert!(table.lookup("9920").is_none());
        // 79 is valid; 99 is not a pathology segment.
        assert!(table.lookup("7999").is_none());
        assert!(!table.exists("0000"));
    }

    #[test]
    fn compose_matches_lookup() {
        let table = CodeTable::new();
        let composed = table.compose("34", "70").unwrap();
        assert_eq!(composed.code, "3470");
        assert_eq!(composed, table.lookup("3470").unwrap());
    }

    #[test]
    fn display_name_lowercases_pathology() {
        let table = CodeTable::new();
        assert_eq!(
            table.display_name("7438").as_deref(),
            Some("Enkel - contusie")
        );
        assert!(table.display_name("badc").is_none());
    }

    #[test]
    fn segment_tables_have_unique_keys() {
        let table = CodeTable::new();
        assert_eq!(table.locations.len(), tables::LOCATIONS.len());
        assert_eq!(table.pathologies.len(), tables::PATHOLOGIES.len());
    }

    #[test]
    fn code_entry_serde_roundtrip() {
        let table = CodeTable::new();
        let entry = table.lookup("2120").unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        let back: CodeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
