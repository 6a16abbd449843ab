//! Game data access.
//!
//! The pipeline only sees the [`GameDataProvider`] trait. Load order
//! conflicts are expected to be resolved by the provider: every record it
//! returns is the winning version.

use crate::models::{EquipmentItem, GameRelease, RaceRecord, Variant};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

/// Source of resolved game records
pub trait GameDataProvider: Send + Sync {
    fn release(&self) -> GameRelease;

    /// The game's `Data` folder
    fn data_path(&self) -> Utf8PathBuf;

    /// Armor records in load order
    fn equipment_items(&self) -> Vec<EquipmentItem>;

    /// Armor addon records in load order
    fn variants(&self) -> Vec<Variant>;

    fn races(&self) -> Vec<RaceRecord>;
}

/// Records exported from a game installation, as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSnapshot {
    pub release: GameRelease,
    pub data_path: Option<Utf8PathBuf>,
    pub races: Vec<RaceRecord>,
    pub equipment: Vec<EquipmentItem>,
    pub variants: Vec<Variant>,
}

/// Provider backed by a YAML [`RecordSnapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    snapshot: RecordSnapshot,
    data_path: Utf8PathBuf,
}

impl SnapshotProvider {
    /// Load a snapshot file. Without a `data_path` entry the snapshot's
    /// own directory is used as data folder.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read record snapshot: {}", path))?;
        let snapshot: RecordSnapshot = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse record snapshot: {}", path))?;

        let fallback = path.parent().map(Utf8Path::to_path_buf).unwrap_or_default();
        tracing::info!(
            "Loaded snapshot {}: {} armors, {} armor addons, {} races",
            path,
            snapshot.equipment.len(),
            snapshot.variants.len(),
            snapshot.races.len()
        );
        Ok(Self::from_snapshot(snapshot, fallback))
    }

    pub fn from_snapshot(snapshot: RecordSnapshot, fallback_data_path: Utf8PathBuf) -> Self {
        let data_path = snapshot.data_path.clone().unwrap_or(fallback_data_path);
        Self { snapshot, data_path }
    }

    /// Point the provider at a different data folder
    pub fn with_data_path(mut self, data_path: Utf8PathBuf) -> Self {
        self.data_path = data_path;
        self
    }

    pub fn snapshot(&self) -> &RecordSnapshot {
        &self.snapshot
    }
}

impl GameDataProvider for SnapshotProvider {
    fn release(&self) -> GameRelease {
        self.snapshot.release
    }

    fn data_path(&self) -> Utf8PathBuf {
        self.data_path.clone()
    }

    fn equipment_items(&self) -> Vec<EquipmentItem> {
        self.snapshot.equipment.clone()
    }

    fn variants(&self) -> Vec<Variant> {
        self.snapshot.variants.clone()
    }

    fn races(&self) -> Vec<RaceRecord> {
        self.snapshot.races.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormKey;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"
release: skyrim-vr
races:
  - form_key: "000800:Lizard.esp"
    editor_id: LizardRace
equipment:
  - form_key: "012E49:Skyrim.esm"
    editor_id: ArmorIronBoots
    race: "000019:Skyrim.esm"
    armature: ["012E4A:Skyrim.esm"]
variants:
  - form_key: "012E4A:Skyrim.esm"
    editor_id: IronBootsAA
    first_person: { feet: true }
    world_model: { male: 'armor\iron\m\boots_0.nif' }
    race: "000019:Skyrim.esm"
"#;

    #[test]
    fn test_load_snapshot_defaults_data_path() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = dir.join("records.yaml");
        fs::write(&path, SNAPSHOT).unwrap();

        let provider = SnapshotProvider::load(&path).unwrap();
        assert_eq!(provider.release(), GameRelease::SkyrimVr);
        assert_eq!(provider.data_path(), dir);
        assert_eq!(provider.races().len(), 1);

        let items = provider.equipment_items();
        assert_eq!(items[0].armature, vec!["012E4A:Skyrim.esm".parse::<FormKey>().unwrap()]);
        let variants = provider.variants();
        assert!(variants[0].first_person.feet);
        assert!(variants[0].supports_race(&FormKey::default_race()));
    }

    #[test]
    fn test_load_snapshot_errors() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        assert!(SnapshotProvider::load(&dir.join("missing.yaml")).is_err());

        let bad = dir.join("bad.yaml");
        fs::write(&bad, "equipment: [{ form_key: nope }]").unwrap();
        let err = SnapshotProvider::load(&bad).unwrap_err();
        assert!(err.to_string().contains("Failed to parse record snapshot"));
    }

    #[test]
    fn test_with_data_path_overrides() {
        let provider = SnapshotProvider::from_snapshot(RecordSnapshot::default(), Utf8PathBuf::from("a"))
            .with_data_path(Utf8PathBuf::from("b"));
        assert_eq!(provider.data_path(), Utf8PathBuf::from("b"));
    }
}
