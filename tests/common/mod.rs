//! Record builders shared by the integration tests

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use custom_race_armor::models::{
    BodyParts, EquipmentItem, FormKey, GenderedModel, ModKey, RaceRecord, RaceSettings, Variant,
};
use custom_race_armor::services::{Eligibility, Limits, PatchConfig, RecordSnapshot, SnapshotProvider};
use custom_race_armor::Severity;
use std::sync::{Arc, Mutex};

pub const RACE_PLUGIN: &str = "Lizard.esp";

pub fn key(id: u32, plugin: &str) -> FormKey {
    FormKey::new(id, ModKey::new(plugin))
}

pub fn race(id: u32, editor_id: &str) -> RaceRecord {
    RaceRecord {
        form_key: key(id, RACE_PLUGIN),
        editor_id: editor_id.to_string(),
        skin: None,
        armor_race: Some(FormKey::default_race()),
    }
}

pub fn lizard_races() -> Vec<RaceRecord> {
    vec![race(0x800, "LizardRace"), race(0x801, "LizardRaceVampire")]
}

/// Armor addon occupying `parts`, with a male mesh at `male_path`
pub fn addon(id: u32, plugin: &str, parts: BodyParts, male_path: &str) -> Variant {
    Variant {
        form_key: key(id, plugin),
        editor_id: format!("Addon{:X}", id),
        first_person: parts,
        world_model: Some(GenderedModel {
            male: Some(male_path.to_string()),
            female: None,
        }),
        first_person_model: None,
        race: Some(FormKey::default_race()),
        additional_races: Vec::new(),
    }
}

pub fn armor(id: u32, plugin: &str, armature: &[FormKey]) -> EquipmentItem {
    EquipmentItem {
        form_key: key(id, plugin),
        editor_id: Some(format!("Armor{:X}", id)),
        race: Some(FormKey::default_race()),
        armature: armature.to_vec(),
    }
}

pub fn feet() -> BodyParts {
    BodyParts {
        feet: true,
        ..BodyParts::NONE
    }
}

pub fn hands() -> BodyParts {
    BodyParts {
        hands: true,
        ..BodyParts::NONE
    }
}

/// Race settings with custom feet, male only, and one rule `^armor\` -> `lizard\`
pub fn lizard_settings() -> RaceSettings {
    RaceSettings {
        custom_head: false,
        custom_body: false,
        custom_hands: false,
        custom_feet: true,
        process_male: true,
        process_female: false,
        path_rules: vec![custom_race_armor::models::PathRuleSettings {
            pattern: r"^armor\\".to_string(),
            replacement: r"lizard\".to_string(),
            gender: None,
        }],
        additional_races: Vec::new(),
    }
}

pub fn provider(
    equipment: Vec<EquipmentItem>,
    variants: Vec<Variant>,
    data_path: &Utf8Path,
) -> SnapshotProvider {
    SnapshotProvider::from_snapshot(
        RecordSnapshot {
            races: lizard_races(),
            equipment,
            variants,
            ..RecordSnapshot::default()
        },
        data_path.to_path_buf(),
    )
}

pub fn patch_config(limits: Limits, data_path: &Utf8Path) -> PatchConfig {
    PatchConfig {
        limits,
        eligibility: Eligibility::new(Vec::<String>::new(), Vec::<String>::new(), "SkinNaked").unwrap(),
        asset_root: Some(data_path.join("meshes")),
        output_name: "CRA".to_string(),
        prepare_races: false,
    }
}

pub fn utf8_dir(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

/// Create an empty mesh file below `<data>/meshes`
pub fn touch_mesh(data_path: &Utf8Path, relative: &str) {
    let path = data_path.join("meshes").join(relative.replace('\\', "/"));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"").unwrap();
}

/// Sink that keeps every message
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<(Severity, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events().iter().filter(|(s, _)| *s == severity).count()
    }
}

impl custom_race_armor::ProgressSink for RecordingSink {
    fn report(&self, severity: Severity, message: &str) {
        self.events.lock().unwrap().push((severity, message.to_string()));
    }
}
