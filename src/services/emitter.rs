//! Turns the decisions of one group into records inside its output plugin.

use crate::models::{FormKey, Gender, OutputContainer, Variant};
use crate::progress::{ProgressSink, Severity};
use crate::services::classifier::{Decision, RaceProfile};
use crate::services::graph::{CandidateGraph, RaceDecision};
use crate::services::grouping::EquipmentGroup;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use std::collections::HashMap;

/// Counters collected while emitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub groups: usize,
    pub duplicates_created: usize,
    pub duplicates_reused: usize,
    pub variant_overrides: usize,
    pub equipment_overrides: usize,
    pub races_appended: usize,
}

/// Writes group decisions into output containers.
///
/// Holds the run-scoped state shared across groups: the duplicate table
/// and the set of mesh paths already reported missing.
pub struct Emitter<'a> {
    profiles: &'a [RaceProfile],
    asset_root: Option<Utf8PathBuf>,
    sink: &'a dyn ProgressSink,
    missing_paths: IndexSet<String>,
    duplicates: HashMap<(usize, String), FormKey>,
    stats: EmitStats,
}

impl<'a> Emitter<'a> {
    /// `asset_root` is the directory rewritten mesh paths are resolved
    /// against; `None` disables the existence check.
    pub fn new(profiles: &'a [RaceProfile], asset_root: Option<Utf8PathBuf>, sink: &'a dyn ProgressSink) -> Self {
        Self {
            profiles,
            asset_root,
            sink,
            missing_paths: IndexSet::new(),
            duplicates: HashMap::new(),
            stats: EmitStats::default(),
        }
    }

    pub fn stats(&self) -> &EmitStats {
        &self.stats
    }

    /// Rewritten mesh paths that did not exist, in first-seen order
    pub fn missing_paths(&self) -> &IndexSet<String> {
        &self.missing_paths
    }

    pub fn into_missing_paths(self) -> IndexSet<String> {
        self.missing_paths
    }

    /// Emit every decision of `group` into `container`.
    pub fn emit_group(&mut self, graph: &mut CandidateGraph, group: &EquipmentGroup, container: &mut OutputContainer) {
        let profiles = self.profiles;
        for variant_key in &group.variants {
            let Some(info) = graph.variants.get(variant_key) else {
                continue;
            };
            let decisions: Vec<RaceDecision> = info.decisions.values().copied().collect();

            for race_decision in decisions {
                let Some(profile) = profiles.get(race_decision.profile) else {
                    continue;
                };
                match race_decision.decision {
                    Decision::NewDuplicate { .. } => {
                        self.emit_duplicate(graph, variant_key, profile, race_decision.decision, container)
                    }
                    Decision::ExtendOverride => self.emit_extension(graph, variant_key, profile, container),
                }
            }
        }
        self.stats.groups += 1;
    }

    fn emit_duplicate(
        &mut self,
        graph: &mut CandidateGraph,
        variant_key: &FormKey,
        profile: &RaceProfile,
        decision: Decision,
        container: &mut OutputContainer,
    ) {
        let Some(info) = graph.variants.get(variant_key) else {
            return;
        };
        let source = &info.record;
        let editor_id = format!("{}{}", profile.target.editor_id(), source.editor_id);
        let dedup_key = (container.index(), editor_id.clone());

        let duplicate_key = match self.duplicates.get(&dedup_key) {
            Some(existing) => {
                self.stats.duplicates_reused += 1;
                existing.clone()
            }
            None => {
                let record = self.build_duplicate(source, profile, decision, &info.equipment, graph);
                let index = container.plugin.duplicate_variant(&record, editor_id);
                let key = container.plugin.new_variants[index].form_key.clone();
                self.sink.report(
                    Severity::Trace,
                    &format!("created {} from {}", container.plugin.new_variants[index].editor_id, source.form_key),
                );
                self.duplicates.insert(dedup_key, key.clone());
                self.stats.duplicates_created += 1;
                key
            }
        };

        let referencing: Vec<FormKey> = info.equipment.iter().cloned().collect();
        for item_key in referencing {
            let Some(item) = graph.equipment.get_mut(&item_key) else {
                continue;
            };
            let mut created = false;
            let slot = *item.override_slot.get_or_insert_with(|| {
                created = true;
                container.plugin.override_equipment(&item.record)
            });
            if created {
                self.stats.equipment_overrides += 1;
            }
            let armature = &mut container.plugin.equipment_overrides[slot].armature;
            if !armature.contains(&duplicate_key) {
                armature.push(duplicate_key.clone());
            }
        }
    }

    /// Copy `source` with rewritten mesh paths and the race fields of `profile`.
    fn build_duplicate(
        &mut self,
        source: &Variant,
        profile: &RaceProfile,
        decision: Decision,
        referencing: &IndexSet<FormKey>,
        graph: &CandidateGraph,
    ) -> Variant {
        let mut record = source.clone();

        for gender in Gender::ALL {
            let Some(rule) = decision.rule_for(gender).and_then(|i| profile.rule(gender, i)) else {
                continue;
            };
            let Some(old_path) = source.world_path(gender) else {
                continue;
            };
            let new_path = rule.apply(old_path).into_owned();

            if let Some(world) = record.world_model.as_mut() {
                world.set(gender, new_path.clone());
            }
            if let Some(first_person) = record.first_person_model.as_mut() {
                if first_person.get(gender) == Some(old_path) {
                    first_person.set(gender, new_path.clone());
                }
            }

            if !self.asset_exists(&new_path) {
                self.report_missing(source, old_path, new_path, referencing, graph);
            }
        }

        record.race = Some(profile.target.main.form_key.clone());
        record.additional_races.clear();
        record
            .additional_races
            .extend(profile.target.additional.iter().map(|r| r.form_key.clone()));
        record
    }

    fn emit_extension(
        &mut self,
        graph: &mut CandidateGraph,
        variant_key: &FormKey,
        profile: &RaceProfile,
        container: &mut OutputContainer,
    ) {
        let Some(info) = graph.variants.get_mut(variant_key) else {
            return;
        };
        let mut created = false;
        let slot = *info.override_slot.get_or_insert_with(|| {
            created = true;
            container.plugin.override_variant(&info.record)
        });
        if created {
            self.stats.variant_overrides += 1;
        }

        let record = &mut container.plugin.variant_overrides[slot];
        let races = std::iter::once(&profile.target.main).chain(&profile.target.additional);
        for race in races {
            let key = &race.form_key;
            if record.race.as_ref() == Some(key) || record.additional_races.contains(key) {
                continue;
            }
            record.additional_races.push(key.clone());
            self.stats.races_appended += 1;
        }
    }

    fn asset_exists(&self, path: &str) -> bool {
        match &self.asset_root {
            Some(root) => root.join(path.replace('\\', "/")).exists(),
            None => true,
        }
    }

    fn report_missing(
        &mut self,
        source: &Variant,
        old_path: &str,
        new_path: String,
        referencing: &IndexSet<FormKey>,
        graph: &CandidateGraph,
    ) {
        if self.missing_paths.contains(&new_path) {
            self.sink.report(
                Severity::Trace,
                &format!("{} also uses missing mesh {}", source.editor_id, new_path),
            );
            return;
        }

        self.sink.report(
            Severity::Warning,
            &format!(
                "Missing mesh in {}: {} (was {})",
                source.origin(),
                new_path,
                old_path
            ),
        );
        for item_key in referencing {
            let name = graph
                .equipment
                .get(item_key)
                .map(|i| i.record.name().to_string())
                .unwrap_or_else(|| item_key.to_string());
            self.sink.report(Severity::Debug, &format!("  used by {}", name));
        }
        self.missing_paths.insert(new_path);
    }
}

/// Resolve the mesh directory of a data folder
pub fn mesh_root(data_path: &Utf8Path) -> Utf8PathBuf {
    data_path.join("meshes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyParts, EquipmentItem, GenderedModel, ModKey, PluginDraft, RaceRecord};
    use crate::progress::Cancellation;
    use crate::services::classifier::{PathRule, RaceTarget};
    use crate::services::graph::{Eligibility, GraphBuilder};
    use crate::services::grouping::compile_groups;
    use indexmap::IndexMap;
    use std::sync::Mutex;

    fn race(id: u32, name: &str) -> RaceRecord {
        RaceRecord {
            form_key: FormKey::new(id, ModKey::new("MyRace.esp")),
            editor_id: name.to_string(),
            skin: None,
            armor_race: None,
        }
    }

    fn profile() -> RaceProfile {
        RaceProfile::new(
            RaceTarget {
                main: race(0x800, "MyRace"),
                additional: vec![race(0x801, "MyRaceVampire")],
            },
            BodyParts {
                feet: true,
                ..BodyParts::NONE
            },
            true,
            false,
            vec![PathRule::new(r"^armor\\", r"myrace\").unwrap()],
            vec![],
        )
    }

    fn boots(id: u32, feet: bool, path: &str) -> Variant {
        Variant {
            form_key: FormKey::new(id, ModKey::new("Armors.esp")),
            editor_id: format!("Boots{:X}AA", id),
            first_person: BodyParts {
                feet,
                body: !feet,
                ..BodyParts::NONE
            },
            world_model: Some(GenderedModel {
                male: Some(path.to_string()),
                female: None,
            }),
            first_person_model: Some(GenderedModel {
                male: Some(path.to_string()),
                female: None,
            }),
            race: Some(FormKey::default_race()),
            additional_races: vec![],
        }
    }

    fn item(id: u32, armature: &[u32]) -> EquipmentItem {
        EquipmentItem {
            form_key: FormKey::new(id, ModKey::new("Items.esp")),
            editor_id: Some(format!("Item{}", id)),
            race: Some(FormKey::default_race()),
            armature: armature
                .iter()
                .map(|a| FormKey::new(*a, ModKey::new("Armors.esp")))
                .collect(),
        }
    }

    fn graph(items: &[EquipmentItem], variants: Vec<Variant>, profiles: &[RaceProfile]) -> CandidateGraph {
        let variants: IndexMap<FormKey, Variant> =
            variants.into_iter().map(|v| (v.form_key.clone(), v)).collect();
        let rules = Eligibility::new(Vec::<String>::new(), Vec::<String>::new(), "SkinNaked").unwrap();
        GraphBuilder::new(&rules, profiles).build(items, &variants, &Cancellation::none(), &|_: Severity, _: &str| {})
    }

    fn container() -> OutputContainer {
        OutputContainer::new(0, PluginDraft::new(ModKey::new("Out.esp"), true))
    }

    #[test]
    fn test_duplicate_shared_by_items() {
        let profiles = vec![profile()];
        let items = vec![item(1, &[0x10]), item(2, &[0x10])];
        let mut graph = graph(&items, vec![boots(0x10, true, r"armor\iron\boots.nif")], &profiles);
        let groups = compile_groups(&mut graph);
        let mut out = container();

        let sink = |_: Severity, _: &str| {};
        let mut emitter = Emitter::new(&profiles, None, &sink);
        emitter.emit_group(&mut graph, &groups[0], &mut out);

        let draft = &out.plugin;
        assert_eq!(draft.new_variants.len(), 1);
        let dup = &draft.new_variants[0];
        assert_eq!(dup.editor_id, "MyRaceBoots10AA");
        assert_eq!(dup.world_path(Gender::Male), Some(r"myrace\iron\boots.nif"));
        assert_eq!(
            dup.first_person_model.as_ref().and_then(|m| m.get(Gender::Male)),
            Some(r"myrace\iron\boots.nif")
        );
        assert_eq!(dup.race, Some(race(0x800, "MyRace").form_key));
        assert_eq!(dup.additional_races, vec![race(0x801, "MyRaceVampire").form_key]);

        assert_eq!(draft.equipment_overrides.len(), 2);
        for ov in &draft.equipment_overrides {
            assert_eq!(ov.armature.last(), Some(&dup.form_key));
            assert_eq!(ov.armature.len(), 2);
        }
        assert!(emitter.missing_paths().is_empty());
    }

    #[test]
    fn test_extension_appends_races_once() {
        let profiles = vec![profile()];
        let items = vec![item(1, &[0x10]), item(2, &[0x10]), item(3, &[0x10])];
        let mut graph = graph(&items, vec![boots(0x10, false, r"armor\iron\cuirass.nif")], &profiles);
        let groups = compile_groups(&mut graph);
        let mut out = container();

        let sink = |_: Severity, _: &str| {};
        let mut emitter = Emitter::new(&profiles, None, &sink);
        emitter.emit_group(&mut graph, &groups[0], &mut out);
        // A second pass is a no-op
        emitter.emit_group(&mut graph, &groups[0], &mut out);

        let draft = &out.plugin;
        assert!(draft.new_variants.is_empty());
        assert!(draft.equipment_overrides.is_empty());
        assert_eq!(draft.variant_overrides.len(), 1);
        assert_eq!(draft.variant_overrides[0].additional_races.len(), 2);
        assert_eq!(emitter.stats().races_appended, 2);
        assert_eq!(emitter.stats().variant_overrides, 1);
    }

    #[test]
    fn test_missing_mesh_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let profiles = vec![profile()];
        let items = vec![item(1, &[0x10, 0x11]), item(2, &[0x10]), item(3, &[0x11])];
        let variants = vec![
            boots(0x10, true, r"armor\shared\boots.nif"),
            boots(0x11, true, r"armor\shared\boots.nif"),
        ];
        let mut graph = graph(&items, variants, &profiles);
        let groups = compile_groups(&mut graph);
        let mut out = container();

        let warnings = Mutex::new(Vec::new());
        let sink = |severity: Severity, message: &str| {
            if severity == Severity::Warning {
                warnings.lock().unwrap().push(message.to_string());
            }
        };
        let mut emitter = Emitter::new(&profiles, Some(root), &sink);
        emitter.emit_group(&mut graph, &groups[0], &mut out);

        assert_eq!(out.plugin.new_variants.len(), 2);
        assert_eq!(warnings.lock().unwrap().len(), 1);
        assert_eq!(
            emitter.missing_paths().iter().collect::<Vec<_>>(),
            vec![r"myrace\shared\boots.nif"]
        );
    }

    #[test]
    fn test_existing_mesh_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("myrace/iron")).unwrap();
        std::fs::write(root.join("myrace/iron/boots.nif"), b"nif").unwrap();

        let profiles = vec![profile()];
        let items = vec![item(1, &[0x10])];
        let mut graph = graph(&items, vec![boots(0x10, true, r"armor\iron\boots.nif")], &profiles);
        let groups = compile_groups(&mut graph);
        let mut out = container();

        let sink = |_: Severity, _: &str| {};
        let mut emitter = Emitter::new(&profiles, Some(root), &sink);
        emitter.emit_group(&mut graph, &groups[0], &mut out);
        assert!(emitter.missing_paths().is_empty());
    }
}
