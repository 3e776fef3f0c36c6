use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, warn};

use crate::config::Config;

/// Raw taxonomy label to canonical display name, matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    lower_map: HashMap<String, String>,
    /// Aliases and canonical names exactly as written in the file.
    known: HashSet<String>,
}

impl AliasTable {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = AliasTable::default();
        for (alias, canonical) in pairs {
            let alias = alias.as_ref();
            let key = alias.trim().to_lowercase();
            let canonical = canonical.as_ref().trim();
            if key.is_empty() {
                continue;
            }
            if !canonical.is_empty() {
                table.known.insert(canonical.to_string());
                table.lower_map.insert(key, canonical.to_string());
            }
            table.known.insert(alias.to_string());
        }
        table
    }

    /// Load a `{"raw label": "Canonical Name"}` file. A missing or unreadable
    /// file gives an empty table.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!(path = %path.display(), "No alias file, using empty table");
                return AliasTable::default();
            }
        };
        match serde_json::from_str::<HashMap<String, String>>(&raw) {
            Ok(map) => {
                let table = AliasTable::from_pairs(map);
                debug!(path = %path.display(), aliases = table.len(), "Loaded alias table");
                table
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unparsable alias file, using empty table");
                AliasTable::default()
            }
        }
    }

    /// Canonical name for `raw`, or the trimmed input when there is no alias.
    pub fn resolve(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        self.lower_map
            .get(&trimmed.to_lowercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Exact, case-sensitive membership in the alias or canonical names.
    pub fn is_known(&self, text: &str) -> bool {
        self.known.contains(text)
    }

    pub fn len(&self) -> usize {
        self.lower_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyKind {
    PracticeAreas,
    Industries,
}

/// Both alias tables, loaded once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    pub practice_areas: AliasTable,
    pub industries: AliasTable,
}

impl Taxonomy {
    pub fn load(config: &Config) -> Self {
        Self {
            practice_areas: AliasTable::load(&config.practice_area_aliases),
            industries: AliasTable::load(&config.industry_aliases),
        }
    }

    pub fn table(&self, kind: TaxonomyKind) -> &AliasTable {
        match kind {
            TaxonomyKind::PracticeAreas => &self.practice_areas,
            TaxonomyKind::Industries => &self.industries,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::slug::normalize_slug;

    fn industries() -> AliasTable {
        AliasTable::from_pairs([
            ("healthcare", "Health Care"),
            ("Health-Care", "Health Care"),
            ("real-estate", "Real Estate"),
        ])
    }

    #[test]
    fn resolves_case_insensitively_after_trim() {
        let table = industries();
        assert_eq!(table.resolve("Healthcare"), "Health Care");
        assert_eq!(table.resolve("  HEALTHCARE "), "Health Care");
    }

    #[test]
    fn unknown_label_passes_through_trimmed() {
        assert_eq!(industries().resolve("  Agriculture "), "Agriculture");
    }

    #[test]
    fn aliases_of_one_concept_share_a_slug() {
        let table = industries();
        let aliases = ["healthcare", "Health-Care", "Health Care", "HEALTHCARE"];
        let slugs: HashSet<String> = aliases
            .iter()
            .map(|a| normalize_slug(&table.resolve(a)))
            .collect();
        assert_eq!(slugs.len(), 1);
        assert!(slugs.contains("health-care"));
    }

    #[test]
    fn canonical_names_are_known() {
        let table = industries();
        assert!(table.is_known("Health Care"));
        assert!(table.is_known("Real Estate"));
        assert!(table.is_known("healthcare"));
        assert!(table.is_known("Health-Care"));
        assert!(!table.is_known("health care"));
        assert!(!table.is_known("Agriculture"));
    }

    #[test]
    fn missing_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = AliasTable::load(&dir.path().join("nope.json"));
        assert!(table.is_empty());
        assert_eq!(table.resolve("Healthcare"), "Healthcare");
    }

    #[test]
    fn unparsable_file_is_empty_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(AliasTable::load(file.path()).is_empty());
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"IP": "Intellectual Property"}}"#).unwrap();
        let table = AliasTable::load(file.path());
        assert_eq!(table.resolve("ip"), "Intellectual Property");
    }
}
