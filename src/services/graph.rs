//! Candidate graph: which equipment references which variants, and what each
//! (variant, race) pair needs.
//!
//! The item/variant relation is shared and cyclic in general, so it is kept
//! as two key-indexed maps with explicit adjacency sets rather than as
//! references between records.

use crate::models::{EquipmentItem, FormKey, Gender, Variant};
use crate::progress::{Cancellation, ProgressSink, Severity};
use crate::services::classifier::{classify, Decision, RaceProfile};
use crate::services::error::PatchError;
use indexmap::{IndexMap, IndexSet};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Filters deciding which equipment is considered at all
#[derive(Debug, Clone)]
pub struct Eligibility {
    ignored: HashSet<String>,
    non_wearable: Vec<Regex>,
    skin_prefix: String,
    default_race: FormKey,
}

impl Eligibility {
    pub fn new<I, P>(ignored: I, non_wearable_patterns: P, skin_prefix: impl Into<String>) -> Result<Self, PatchError>
    where
        I: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        let non_wearable = non_wearable_patterns
            .into_iter()
            .map(|pattern| {
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| PatchError::InvalidNonWearablePattern { pattern, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ignored: ignored.into_iter().collect(),
            non_wearable,
            skin_prefix: skin_prefix.into(),
            default_race: FormKey::default_race(),
        })
    }

    pub fn default_race(&self) -> &FormKey {
        &self.default_race
    }

    pub fn is_ignored(&self, item: &EquipmentItem) -> bool {
        match item.editor_id.as_deref() {
            Some(name) => self.ignored.contains(name),
            None => true,
        }
    }

    /// Whether `item` is real, default-race armor the race can be given access to.
    pub fn is_wearable(
        &self,
        item: &EquipmentItem,
        variants: &IndexMap<FormKey, Variant>,
        profile: &RaceProfile,
    ) -> bool {
        let Some(name) = item.editor_id.as_deref() else {
            return false;
        };
        if !self.skin_prefix.is_empty() && name.starts_with(&self.skin_prefix) {
            return false;
        }

        let resolved: Vec<&Variant> = item.armature.iter().filter_map(|k| variants.get(k)).collect();
        if resolved.iter().any(|v| self.is_non_wearable(v, profile)) {
            return false;
        }

        item.race.as_ref() == Some(&self.default_race)
            || resolved.iter().any(|v| v.supports_race(&self.default_race))
    }

    fn is_non_wearable(&self, variant: &Variant, profile: &RaceProfile) -> bool {
        Gender::ALL
            .iter()
            .filter(|g| profile.processes(**g))
            .filter_map(|g| variant.world_path(*g))
            .any(|path| self.non_wearable.iter().any(|re| re.is_match(path)))
    }
}

/// Graph node for one equipment item
#[derive(Debug, Clone)]
pub struct EquipmentInfo {
    pub record: EquipmentItem,
    /// Eligible variants this item references
    pub variants: IndexSet<FormKey>,
    pub(crate) assigned: bool,
    pub(crate) override_slot: Option<usize>,
}

impl EquipmentInfo {
    fn new(record: EquipmentItem) -> Self {
        Self {
            record,
            variants: IndexSet::new(),
            assigned: false,
            override_slot: None,
        }
    }

    /// Set once the item has been placed in a group
    pub fn is_assigned(&self) -> bool {
        self.assigned
    }
}

/// Decision for one race, with the index of the race's profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceDecision {
    pub profile: usize,
    pub decision: Decision,
}

/// Graph node for one variant
#[derive(Debug, Clone)]
pub struct VariantInfo {
    pub record: Variant,
    /// Items referencing this variant
    pub equipment: IndexSet<FormKey>,
    /// Decisions keyed by main race
    pub decisions: IndexMap<FormKey, RaceDecision>,
    pub(crate) override_slot: Option<usize>,
}

impl VariantInfo {
    fn new(record: Variant) -> Self {
        Self {
            record,
            equipment: IndexSet::new(),
            decisions: IndexMap::new(),
            override_slot: None,
        }
    }

    pub fn new_records(&self) -> usize {
        self.decisions.values().map(|d| d.decision.new_records()).sum()
    }

    pub fn override_records(&self) -> usize {
        self.decisions.values().map(|d| d.decision.override_records()).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateGraph {
    pub equipment: IndexMap<FormKey, EquipmentInfo>,
    pub variants: IndexMap<FormKey, VariantInfo>,
    classifications: usize,
    scanned: usize,
    cancelled: bool,
}

impl CandidateGraph {
    /// Number of times the classifier actually ran
    pub fn classifications(&self) -> usize {
        self.classifications
    }

    /// Number of top-level items looked at before the scan ended
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn decision(&self, variant: &FormKey, race: &FormKey) -> Option<&RaceDecision> {
        self.variants.get(variant)?.decisions.get(race)
    }

    /// Link `item` to `variant` and make sure the variant has a decision for `profile`.
    fn link(&mut self, item: &EquipmentItem, variant: &Variant, profile_index: usize, profile: &RaceProfile) {
        self.equipment
            .entry(item.form_key.clone())
            .or_insert_with(|| EquipmentInfo::new(item.clone()))
            .variants
            .insert(variant.form_key.clone());

        let info = self
            .variants
            .entry(variant.form_key.clone())
            .or_insert_with(|| VariantInfo::new(variant.clone()));
        info.equipment.insert(item.form_key.clone());

        let race = &profile.target.main.form_key;
        if !info.decisions.contains_key(race) {
            info.decisions.insert(
                race.clone(),
                RaceDecision {
                    profile: profile_index,
                    decision: classify(variant, profile),
                },
            );
            self.classifications += 1;
        }
    }
}

/// Scans equipment in provider order and builds the [`CandidateGraph`].
pub struct GraphBuilder<'a> {
    eligibility: &'a Eligibility,
    profiles: &'a [RaceProfile],
}

impl<'a> GraphBuilder<'a> {
    pub fn new(eligibility: &'a Eligibility, profiles: &'a [RaceProfile]) -> Self {
        Self {
            eligibility,
            profiles,
        }
    }

    /// Build the graph. Cancellation is checked before each top-level item;
    /// a cancelled scan returns the partial graph with `was_cancelled()` set.
    pub fn build(
        &self,
        items: &[EquipmentItem],
        variants: &IndexMap<FormKey, Variant>,
        cancel: &Cancellation,
        sink: &dyn ProgressSink,
    ) -> CandidateGraph {
        let mut graph = CandidateGraph::default();
        let default_race = self.eligibility.default_race();

        for item in items {
            if cancel.is_cancelled() {
                sink.report(Severity::Warning, "equipment scan cancelled");
                graph.cancelled = true;
                break;
            }
            graph.scanned += 1;

            if self.eligibility.is_ignored(item) {
                continue;
            }

            for (profile_index, profile) in self.profiles.iter().enumerate() {
                if !self.eligibility.is_wearable(item, variants, profile) {
                    continue;
                }
                sink.report(
                    Severity::Trace,
                    &format!("processing {} for {}", item.name(), profile.target.editor_id()),
                );

                for key in &item.armature {
                    let Some(variant) = variants.get(key) else {
                        sink.report(
                            Severity::Debug,
                            &format!("{} references unknown armor addon {}", item.name(), key),
                        );
                        continue;
                    };
                    if !variant.supports_race(default_race) {
                        continue;
                    }
                    graph.link(item, variant, profile_index, profile);
                }
            }
        }

        tracing::debug!(
            "Candidate graph: {} equipment, {} variants, {} classifications",
            graph.equipment.len(),
            graph.variants.len(),
            graph.classifications
        );

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyParts, GenderedModel, ModKey, RaceRecord};
    use crate::services::classifier::{PathRule, RaceTarget};

    fn key(id: u32) -> FormKey {
        FormKey::new(id, ModKey::new("Armors.esp"))
    }

    fn variant(id: u32, path: &str) -> Variant {
        Variant {
            form_key: key(id),
            editor_id: format!("AA{:X}", id),
            first_person: BodyParts {
                feet: true,
                ..BodyParts::NONE
            },
            world_model: Some(GenderedModel {
                male: None,
                female: Some(path.to_string()),
            }),
            first_person_model: None,
            race: Some(FormKey::default_race()),
            additional_races: Vec::new(),
        }
    }

    fn item(id: u32, name: &str, armature: &[u32]) -> EquipmentItem {
        EquipmentItem {
            form_key: key(id),
            editor_id: Some(name.to_string()),
            race: Some(FormKey::default_race()),
            armature: armature.iter().map(|a| key(*a)).collect(),
        }
    }

    fn profile(main_id: u32) -> RaceProfile {
        let race = |id: u32, name: &str| RaceRecord {
            form_key: FormKey::new(id, ModKey::new("MyRace.esp")),
            editor_id: name.to_string(),
            skin: None,
            armor_race: None,
        };
        RaceProfile::new(
            RaceTarget {
                main: race(main_id, &format!("Race{:X}", main_id)),
                additional: vec![],
            },
            BodyParts {
                feet: true,
                ..BodyParts::NONE
            },
            false,
            true,
            vec![],
            vec![PathRule::new("^armor", "Race$0").unwrap()],
        )
    }

    fn eligibility() -> Eligibility {
        Eligibility::new(
            vec!["IgnoredBoots".to_string()],
            vec![r"^actors\\".to_string()],
            "SkinNaked",
        )
        .unwrap()
    }

    fn variants(list: Vec<Variant>) -> IndexMap<FormKey, Variant> {
        list.into_iter().map(|v| (v.form_key.clone(), v)).collect()
    }

    #[test]
    fn test_shared_variant_classified_once() {
        let variants = variants(vec![variant(0x10, r"armor\boots.nif")]);
        let items = vec![item(1, "BootsA", &[0x10]), item(2, "BootsB", &[0x10])];
        let profiles = vec![profile(0x800)];
        let rules = eligibility();

        let graph = GraphBuilder::new(&rules, &profiles).build(
            &items,
            &variants,
            &Cancellation::none(),
            &|_: Severity, _: &str| {},
        );

        assert_eq!(graph.classifications(), 1);
        assert_eq!(graph.equipment.len(), 2);
        let info = &graph.variants[&key(0x10)];
        assert_eq!(info.equipment.len(), 2);
        assert_eq!(info.decisions.len(), 1);
    }

    #[test]
    fn test_one_decision_per_main_race() {
        let variants = variants(vec![variant(0x10, r"armor\boots.nif")]);
        let items = vec![item(1, "BootsA", &[0x10])];
        // Same main race configured twice
        let profiles = vec![profile(0x800), profile(0x800), profile(0x900)];
        let rules = eligibility();

        let graph = GraphBuilder::new(&rules, &profiles).build(
            &items,
            &variants,
            &Cancellation::none(),
            &|_: Severity, _: &str| {},
        );

        let info = &graph.variants[&key(0x10)];
        assert_eq!(info.decisions.len(), 2);
        assert_eq!(graph.classifications(), 2);
        assert_eq!(info.decisions[&FormKey::new(0x800, ModKey::new("MyRace.esp"))].profile, 0);
    }

    #[test]
    fn test_non_wearable_female_path_excludes_item() {
        let mut mixed = variant(0x10, r"actors\werewolf\feet.nif");
        if let Some(world) = mixed.world_model.as_mut() {
            world.male = Some(r"armor\boots.nif".to_string());
        }
        let variants = variants(vec![mixed]);
        let boots = item(1, "Boots", &[0x10]);
        let rules = eligibility();

        // Female processed: the creature path on the female side disqualifies it
        assert!(!rules.is_wearable(&boots, &variants, &profile(0x800)));

        // Male only: the female path is never looked at
        let mut male_only = profile(0x800);
        male_only.process_male = true;
        male_only.process_female = false;
        assert!(rules.is_wearable(&boots, &variants, &male_only));
    }

    #[test]
    fn test_filters_ignored_skin_and_non_wearable() {
        let variants = variants(vec![
            variant(0x10, r"armor\boots.nif"),
            variant(0x11, r"actors\dragon\scales.nif"),
        ]);
        let items = vec![
            item(1, "IgnoredBoots", &[0x10]),
            item(2, "SkinNakedMyRace", &[0x10]),
            item(3, "DragonScales", &[0x11]),
            EquipmentItem {
                editor_id: None,
                ..item(4, "", &[0x10])
            },
            item(5, "RealBoots", &[0x10]),
        ];
        let profiles = vec![profile(0x800)];
        let rules = eligibility();

        let graph = GraphBuilder::new(&rules, &profiles).build(
            &items,
            &variants,
            &Cancellation::none(),
            &|_: Severity, _: &str| {},
        );

        assert_eq!(graph.equipment.len(), 1);
        assert!(graph.equipment.contains_key(&key(5)));
        assert_eq!(graph.scanned(), 5);
    }

    #[test]
    fn test_skips_variants_without_default_race() {
        let mut other = variant(0x12, r"armor\boots.nif");
        other.race = Some(FormKey::new(0x13746, ModKey::new("Skyrim.esm")));
        let variants = variants(vec![variant(0x10, r"armor\boots.nif"), other]);
        let items = vec![item(1, "Boots", &[0x10, 0x12, 0x99])];
        let profiles = vec![profile(0x800)];
        let rules = eligibility();

        let graph = GraphBuilder::new(&rules, &profiles).build(
            &items,
            &variants,
            &Cancellation::none(),
            &|_: Severity, _: &str| {},
        );

        assert_eq!(graph.variants.len(), 1);
        assert_eq!(graph.equipment[&key(1)].variants.len(), 1);
    }

    #[test]
    fn test_cancelled_scan_stops_early() {
        let variants = variants(vec![variant(0x10, r"armor\boots.nif")]);
        let items = vec![item(1, "BootsA", &[0x10])];
        let profiles = vec![profile(0x800)];
        let rules = eligibility();
        let (tx, cancel) = Cancellation::channel();
        tx.send(true).unwrap();

        let graph = GraphBuilder::new(&rules, &profiles).build(
            &items,
            &variants,
            &cancel,
            &|_: Severity, _: &str| {},
        );

        assert!(graph.was_cancelled());
        assert_eq!(graph.scanned(), 0);
        assert!(graph.equipment.is_empty());
    }

    #[test]
    fn test_invalid_non_wearable_pattern() {
        let err = Eligibility::new(Vec::<String>::new(), vec!["[".to_string()], "Skin").unwrap_err();
        assert!(matches!(err, PatchError::InvalidNonWearablePattern { .. }));
    }
}
