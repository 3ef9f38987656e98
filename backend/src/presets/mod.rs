//! Preset Registry - store and reuse selector sets
//!
//! Saves named [`Selectors`] to disk and matches them to CSV files by the
//! columns they reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PresetError, PresetResult};
use crate::models::Selectors;

/// Directory where presets are stored (relative to current dir)
pub const DEFAULT_PRESET_DIR: &str = ".unique-contact/presets";

/// Below this share of referenced columns a preset is not offered.
const MIN_COMPATIBILITY: f64 = 0.5;

/// A stored preset with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPreset {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub selectors: Selectors,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last time this preset was used
    pub last_used: Option<String>,
    /// Number of times used
    pub use_count: u32,
}

/// Registry for managing selector presets
pub struct PresetRegistry {
    registry_dir: PathBuf,
    presets: HashMap<String, StoredPreset>,
}

impl PresetRegistry {
    /// Open the default registry, loading existing presets from disk
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_PRESET_DIR)
    }

    /// Open a registry in a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            presets: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load every readable preset file; unreadable ones are ignored
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(preset) = serde_json::from_str::<StoredPreset>(&content) {
                        self.presets.insert(preset.id.clone(), preset);
                    }
                }
            }
        }
    }

    /// All stored presets, most used first
    pub fn list(&self) -> Vec<&StoredPreset> {
        let mut presets: Vec<_> = self.presets.values().collect();
        presets.sort_by(|a, b| b.use_count.cmp(&a.use_count).then_with(|| a.id.cmp(&b.id)));
        presets
    }

    pub fn get(&self, id: &str) -> Option<&StoredPreset> {
        self.presets.get(id)
    }

    /// Like [`get`](Self::get) but missing presets are an error
    pub fn require(&self, id: &str) -> PresetResult<&StoredPreset> {
        self.get(id).ok_or_else(|| PresetError::NotFound(id.to_string()))
    }

    /// Presets whose referenced fields appear in `csv_columns`.
    ///
    /// Sorted by compatibility, then use count (both descending).
    pub fn find_compatible(&self, csv_columns: &[String]) -> Vec<(&StoredPreset, f64)> {
        let mut compatible: Vec<_> = self
            .presets
            .values()
            .filter_map(|p| {
                let score = compatibility(&p.selectors, csv_columns);
                (score > MIN_COMPATIBILITY).then_some((p, score))
            })
            .collect();

        compatible.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.use_count.cmp(&a.0.use_count))
        });

        compatible
    }

    /// Best compatible preset for `csv_columns`, recorded as used.
    pub fn select_for(&mut self, csv_columns: &[String]) -> PresetResult<(StoredPreset, f64)> {
        let (id, score) = self
            .find_compatible(csv_columns)
            .first()
            .map(|(p, score)| (p.id.clone(), *score))
            .ok_or_else(|| PresetError::NoCompatible {
                columns: csv_columns.to_vec(),
            })?;

        self.mark_used(&id)?;
        let preset = self.require(&id)?.clone();
        Ok((preset, score))
    }

    /// Save selectors under a new id
    pub fn save(&mut self, selectors: Selectors, name: &str) -> PresetResult<String> {
        selectors
            .validate()
            .map_err(|e| PresetError::InvalidPreset(e.to_string()))?;

        fs::create_dir_all(&self.registry_dir)?;

        let id = self.next_id(name, chrono::Utc::now().timestamp_millis());
        let stored = StoredPreset {
            id: id.clone(),
            name: name.to_string(),
            selectors,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };

        self.write(&stored)?;
        self.presets.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import selectors from a JSON file
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> PresetResult<String> {
        let content = fs::read_to_string(path)?;
        let selectors: Selectors = serde_json::from_str(&content)?;

        let preset_name = name.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
        });

        self.save(selectors, preset_name)
    }

    /// Record a use of the preset
    pub fn mark_used(&mut self, id: &str) -> PresetResult<()> {
        let preset = self
            .presets
            .get_mut(id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;

        preset.last_used = Some(chrono::Utc::now().to_rfc3339());
        preset.use_count += 1;

        let preset = preset.clone();
        self.write(&preset)
    }

    /// Delete a preset from the registry
    pub fn delete(&mut self, id: &str) -> PresetResult<()> {
        if self.presets.remove(id).is_none() {
            return Err(PresetError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    /// Id for `name` at `millis` that no stored preset uses yet.
    fn next_id(&self, name: &str, millis: i64) -> String {
        let base = generate_id(name, millis);
        let mut id = base.clone();
        let mut n = 2;
        while self.presets.contains_key(&id) || self.path_for(&id).exists() {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        id
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, preset: &StoredPreset) -> PresetResult<()> {
        let content = serde_json::to_string_pretty(preset)?;
        fs::write(self.path_for(&preset.id), content)?;
        Ok(())
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of the preset's fields present in the CSV header (case-insensitive)
fn compatibility(selectors: &Selectors, csv_columns: &[String]) -> f64 {
    let fields = selectors.referenced_fields();
    if fields.is_empty() {
        return 0.0;
    }

    let csv_lower: Vec<String> = csv_columns.iter().map(|c| c.to_lowercase()).collect();
    let match_count = fields
        .iter()
        .filter(|f| csv_lower.contains(&f.to_lowercase()))
        .count();

    match_count as f64 / fields.len() as f64
}

/// Slug of `name` plus a millisecond timestamp
fn generate_id(name: &str, millis: i64) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let slug = if slug.is_empty() { "preset".to_string() } else { slug };
    format!("{}-{}", slug, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn contacts() -> Selectors {
        Selectors::new("name", "code", "destination")
            .with_labels(["code", "destination"])
            .with_variables(["name"])
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compatibility_score() {
        let score = compatibility(&contacts(), &columns(&["name", "code", "phone"]));
        assert!((score - 0.666).abs() < 0.01); // 2 of 3 fields
    }

    #[test]
    fn test_case_insensitive_match() {
        let score = compatibility(&contacts(), &columns(&["NAME", "Code", "DESTINATION"]));
        assert!((score - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_save_reload_and_delete() {
        let dir = tempdir().unwrap();
        let id = {
            let mut registry = PresetRegistry::with_dir(dir.path());
            registry.save(contacts(), "Webitel Contacts").unwrap()
        };
        assert!(id.starts_with("webitel-contacts-"));

        let mut reloaded = PresetRegistry::with_dir(dir.path());
        let preset = reloaded.require(&id).unwrap();
        assert_eq!(preset.selectors, contacts());
        assert_eq!(preset.use_count, 0);

        reloaded.delete(&id).unwrap();
        assert!(reloaded.get(&id).is_none());
        assert!(matches!(reloaded.delete(&id), Err(PresetError::NotFound(_))));
    }

    #[test]
    fn test_mark_used_persists() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        let id = registry.save(contacts(), "contacts").unwrap();

        registry.mark_used(&id).unwrap();
        registry.mark_used(&id).unwrap();

        let reloaded = PresetRegistry::with_dir(dir.path());
        let preset = reloaded.get(&id).unwrap();
        assert_eq!(preset.use_count, 2);
        assert!(preset.last_used.is_some());
    }

    #[test]
    fn test_find_compatible_filters_low_scores() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        registry.save(contacts(), "contacts").unwrap();
        registry
            .save(Selectors::new("iswc", "ipi", "role"), "works")
            .unwrap();

        let found = registry.find_compatible(&columns(&["name", "code", "destination"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.name, "contacts");
    }

    #[test]
    fn test_same_millisecond_ids_do_not_collide() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        let first = registry.save(contacts(), "contacts").unwrap();
        let millis: i64 = first.rsplit('-').next().unwrap().parse().unwrap();

        let next = registry.next_id("contacts", millis);
        assert_eq!(next, format!("{}-2", first));
        assert_eq!(registry.next_id("other", millis), format!("other-{}", millis));
    }

    #[test]
    fn test_repeated_saves_keep_every_preset() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        let ids: Vec<String> = (0..5)
            .map(|_| registry.save(contacts(), "contacts").unwrap())
            .collect();

        assert_eq!(registry.list().len(), 5);
        assert_eq!(PresetRegistry::with_dir(dir.path()).list().len(), 5);
        for id in &ids {
            assert!(registry.get(id).is_some());
        }
    }

    #[test]
    fn test_select_for_picks_best_and_marks_used() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        registry.save(contacts(), "contacts").unwrap();
        registry
            .save(Selectors::new("iswc", "ipi", "role"), "works")
            .unwrap();

        let (preset, score) = registry
            .select_for(&columns(&["Name", "code", "destination", "phone"]))
            .unwrap();
        assert_eq!(preset.name, "contacts");
        assert!((score - 1.0).abs() < 0.01);
        assert_eq!(preset.use_count, 1);
        assert_eq!(registry.get(&preset.id).unwrap().use_count, 1);
    }

    #[test]
    fn test_select_for_without_match() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());
        registry.save(contacts(), "contacts").unwrap();

        let result = registry.select_for(&columns(&["phone", "email"]));
        assert!(matches!(result, Err(PresetError::NoCompatible { .. })));
    }

    #[test]
    fn test_import_from_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("my-contacts.json");
        fs::write(&file, serde_json::to_string(&contacts()).unwrap()).unwrap();

        let mut registry = PresetRegistry::with_dir(dir.path().join("presets"));
        let id = registry.import(&file, None).unwrap();
        assert_eq!(registry.get(&id).unwrap().name, "my-contacts");
    }

    #[test]
    fn test_invalid_selectors_not_saved() {
        let dir = tempdir().unwrap();
        let mut registry = PresetRegistry::with_dir(dir.path());

        let result = registry.save(Selectors::new("", "code", "destination"), "broken");
        assert!(matches!(result, Err(PresetError::InvalidPreset(_))));
        assert!(registry.list().is_empty());
    }
}
