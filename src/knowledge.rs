use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

/// Attributes of a single place. Fields may be absent in the data file;
/// missing values render as "N/A".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceInfo {
    pub description: Option<String>,
    pub best_time: Option<String>,
    pub activities: Option<String>,
}

/// Static place and interest data backing the chat router.
///
/// Built once at startup and shared immutably afterwards. Place order follows
/// the data file because lookups are first-match-wins, so the entries live in
/// a `Vec` rather than a hash map.
#[derive(Debug)]
pub struct KnowledgeBase {
    places: Vec<(String, PlaceInfo)>,
    interests: Vec<(&'static str, Vec<&'static str>)>,
}

impl KnowledgeBase {
    pub fn new(places: Vec<(String, PlaceInfo)>) -> Self {
        Self {
            places,
            interests: vec![
                ("nature", vec!["netarhat", "patratu", "hundru"]),
                ("wildlife", vec!["betla"]),
                ("pilgrimage", vec!["deoghar"]),
            ],
        }
    }

    /// Load the place file. A missing file is tolerated (empty knowledge
    /// base, warning logged); a malformed one is a startup error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let places = match std::fs::read_to_string(path) {
            Ok(raw) => parse_places(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            Err(_) => {
                warn!(
                    "{} not found. Chatbot knowledge base will be empty.",
                    path.display()
                );
                Vec::new()
            }
        };

        info!(places = places.len(), "knowledge base loaded");
        Ok(Self::new(places))
    }

    pub fn places(&self) -> &[(String, PlaceInfo)] {
        &self.places
    }

    pub fn get(&self, name: &str) -> Option<&PlaceInfo> {
        self.places
            .iter()
            .find(|(place, _)| place == name)
            .map(|(_, info)| info)
    }

    pub fn interests(&self) -> &[(&'static str, Vec<&'static str>)] {
        &self.interests
    }

    pub fn places_for_interest(&self, tag: &str) -> &[&'static str] {
        self.interests
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, places)| places.as_slice())
            .unwrap_or(&[])
    }
}

/// Parse the place file keeping entries in document order. Deserializing
/// into a map type would re-sort the keys and change which place wins an
/// ambiguous substring match.
fn parse_places(raw: &str) -> serde_json::Result<Vec<(String, PlaceInfo)>> {
    struct OrderedPlaces(Vec<(String, PlaceInfo)>);

    impl<'de> Deserialize<'de> for OrderedPlaces {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            struct PlacesVisitor;

            impl<'de> Visitor<'de> for PlacesVisitor {
                type Value = OrderedPlaces;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a map of place name to place info")
                }

                fn visit_map<A: MapAccess<'de>>(
                    self,
                    mut map: A,
                ) -> Result<Self::Value, A::Error> {
                    let mut entries = Vec::new();
                    while let Some(entry) = map.next_entry::<String, PlaceInfo>()? {
                        entries.push(entry);
                    }
                    Ok(OrderedPlaces(entries))
                }
            }

            deserializer.deserialize_map(PlacesVisitor)
        }
    }

    serde_json::from_str::<OrderedPlaces>(raw).map(|places| places.0)
}

/// Uppercase the first character, lowercase the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_preserves_file_order() {
        let raw = r#"{
            "zeta": { "description": "last alphabetically, first in file" },
            "alpha": { "description": "first alphabetically, last in file" }
        }"#;

        let places = parse_places(raw).unwrap();
        assert_eq!(places[0].0, "zeta");
        assert_eq!(places[1].0, "alpha");
    }

    #[test]
    fn missing_file_yields_empty_base() {
        let kb = KnowledgeBase::load("does-not-exist.json").unwrap();
        assert!(kb.places().is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json at all").unwrap();
        assert!(KnowledgeBase::load(file.path()).is_err());
    }

    #[test]
    fn load_reads_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "netarhat": {{ "description": "hill station", "best_time": "October" }} }}"#
        )
        .unwrap();

        let kb = KnowledgeBase::load(file.path()).unwrap();
        let info = kb.get("netarhat").unwrap();
        assert_eq!(info.description.as_deref(), Some("hill station"));
        assert_eq!(info.best_time.as_deref(), Some("October"));
        assert!(info.activities.is_none());
    }

    #[test]
    fn interest_lookup() {
        let kb = KnowledgeBase::new(Vec::new());
        assert_eq!(kb.places_for_interest("wildlife"), &["betla"]);
        assert!(kb.places_for_interest("unknown").is_empty());
    }

    #[test]
    fn capitalize_matches_expected_shape() {
        assert_eq!(capitalize("netarhat"), "Netarhat");
        assert_eq!(capitalize("BETLA"), "Betla");
        assert_eq!(capitalize(""), "");
    }
}
