use crate::models::records::{EquipmentItem, FormKey, ModKey, RaceRecord, Variant};
use indexmap::IndexSet;
use serde::Serialize;

/// First form id available to new records in a plugin (ids below are reserved).
pub const FIRST_NEW_FORM_ID: u32 = 0x800;

/// In-memory content of one output plugin.
///
/// Records are only ever appended; the handles returned by the `add_*`
/// methods are indices into the matching list and stay valid for the run.
#[derive(Debug, Clone, Serialize)]
pub struct PluginDraft {
    pub mod_key: ModKey,
    /// Light (ESL-flagged) plugin
    pub light: bool,
    pub new_variants: Vec<Variant>,
    pub variant_overrides: Vec<Variant>,
    pub equipment_overrides: Vec<EquipmentItem>,
    pub race_overrides: Vec<RaceRecord>,
    #[serde(skip)]
    next_form_id: u32,
}

impl PluginDraft {
    pub fn new(mod_key: ModKey, light: bool) -> Self {
        Self {
            mod_key,
            light,
            new_variants: Vec::new(),
            variant_overrides: Vec::new(),
            equipment_overrides: Vec::new(),
            race_overrides: Vec::new(),
            next_form_id: FIRST_NEW_FORM_ID,
        }
    }

    /// Copy `source` into this plugin as a brand-new record named `editor_id`.
    pub fn duplicate_variant(&mut self, source: &Variant, editor_id: String) -> usize {
        let mut record = source.clone();
        record.form_key = FormKey::new(self.next_form_id, self.mod_key.clone());
        record.editor_id = editor_id;
        self.next_form_id += 1;
        self.new_variants.push(record);
        self.new_variants.len() - 1
    }

    pub fn override_variant(&mut self, source: &Variant) -> usize {
        self.variant_overrides.push(source.clone());
        self.variant_overrides.len() - 1
    }

    pub fn override_equipment(&mut self, source: &EquipmentItem) -> usize {
        self.equipment_overrides.push(source.clone());
        self.equipment_overrides.len() - 1
    }

    pub fn override_race(&mut self, source: &RaceRecord) -> usize {
        self.race_overrides.push(source.clone());
        self.race_overrides.len() - 1
    }

    pub fn new_record_count(&self) -> usize {
        self.new_variants.len()
    }

    pub fn override_count(&self) -> usize {
        self.variant_overrides.len() + self.equipment_overrides.len() + self.race_overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.new_record_count() == 0 && self.override_count() == 0
    }

    /// Every plugin a record in this draft points at, in first-seen order.
    ///
    /// This is what a plugin writer declares as the master list.
    pub fn masters(&self) -> IndexSet<ModKey> {
        let mut masters = IndexSet::new();
        let mut add = |key: &FormKey| {
            if key.origin != self.mod_key {
                masters.insert(key.origin.clone());
            }
        };

        for variant in self.new_variants.iter().chain(&self.variant_overrides) {
            add(&variant.form_key);
            variant.race.iter().for_each(&mut add);
            variant.additional_races.iter().for_each(&mut add);
        }
        for item in &self.equipment_overrides {
            add(&item.form_key);
            item.race.iter().for_each(&mut add);
            item.armature.iter().for_each(&mut add);
        }
        for race in &self.race_overrides {
            add(&race.form_key);
            race.skin.iter().for_each(&mut add);
        }
        masters
    }
}

/// An output file being filled by the allocator.
///
/// Fill counters only grow; a container is never emptied or merged.
#[derive(Debug, Clone)]
pub struct OutputContainer {
    index: usize,
    new_records: usize,
    required_origins: IndexSet<ModKey>,
    units: usize,
    pub plugin: PluginDraft,
}

impl OutputContainer {
    pub fn new(index: usize, plugin: PluginDraft) -> Self {
        Self {
            index,
            new_records: 0,
            required_origins: IndexSet::new(),
            units: 0,
            plugin,
        }
    }

    /// Creation order of this container within the run
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn new_records(&self) -> usize {
        self.new_records
    }

    pub fn required_origins(&self) -> &IndexSet<ModKey> {
        &self.required_origins
    }

    /// Number of groups (and preparation units) assigned here
    pub fn units(&self) -> usize {
        self.units
    }

    pub fn mod_key(&self) -> &ModKey {
        &self.plugin.mod_key
    }

    /// Size of the origin set after hypothetically adding `origins`
    pub fn origins_with(&self, origins: &IndexSet<ModKey>) -> usize {
        self.required_origins.len()
            + origins
                .iter()
                .filter(|o| !self.required_origins.contains(*o))
                .count()
    }

    pub(crate) fn absorb(&mut self, new_records: usize, origins: &IndexSet<ModKey>) {
        self.new_records += new_records;
        self.required_origins.extend(origins.iter().cloned());
        self.units += 1;
    }
}
