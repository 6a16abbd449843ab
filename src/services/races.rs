//! Custom race discovery, target resolution and race preparation.

use crate::models::{EquipmentItem, FormKey, ModKey, PluginDraft, RaceRecord, RaceSettings, Variant};
use crate::services::classifier::RaceTarget;
use crate::services::error::PatchError;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

const VAMPIRE_SUFFIX: &str = "Vampire";

/// A playable race and its vampire form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RacePair {
    pub main: RaceRecord,
    pub vampire: RaceRecord,
}

/// List non-vanilla races that come with a matching `<EditorID>Vampire` race.
///
/// Races without an editor id and incomplete pairs are left out. Pairs are
/// returned in the order their first member was seen.
pub fn discover_races(races: &[RaceRecord]) -> Vec<RacePair> {
    let mut pairs: IndexMap<&str, (Option<&RaceRecord>, Option<&RaceRecord>)> = IndexMap::new();

    for race in races {
        if race.editor_id.is_empty() || race.origin().is_base_master() {
            continue;
        }
        match race.editor_id.strip_suffix(VAMPIRE_SUFFIX) {
            Some(base) if !base.is_empty() => pairs.entry(base).or_default().1 = Some(race),
            _ => pairs.entry(race.editor_id.as_str()).or_default().0 = Some(race),
        }
    }

    pairs
        .into_values()
        .filter_map(|pair| match pair {
            (Some(main), Some(vampire)) => Some(RacePair {
                main: main.clone(),
                vampire: vampire.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn find_race<'r>(races: &'r [RaceRecord], editor_id: &str) -> Result<&'r RaceRecord, PatchError> {
    races
        .iter()
        .find(|r| r.editor_id == editor_id)
        .ok_or_else(|| PatchError::RaceNotFound(editor_id.to_string()))
}

/// Resolve the race `editor_id` and the races that travel with it.
///
/// The configured additional races win; when none are configured the
/// vampire form (`<EditorID>Vampire`) is used if it exists.
pub fn resolve_race_target(
    editor_id: &str,
    settings: &RaceSettings,
    races: &[RaceRecord],
) -> Result<RaceTarget, PatchError> {
    let main = find_race(races, editor_id)?.clone();

    let additional = if settings.additional_races.is_empty() {
        let vampire = format!("{}{}", editor_id, VAMPIRE_SUFFIX);
        races.iter().filter(|r| r.editor_id == vampire).take(1).cloned().collect()
    } else {
        settings
            .additional_races
            .iter()
            .map(|name| find_race(races, name).cloned())
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(RaceTarget { main, additional })
}

/// Overrides that let the custom races use their own meshes at all:
/// armor race cleared on every race, and the naked skin bound to the main race.
#[derive(Debug, Clone, Default)]
pub struct RacePreparation {
    races: Vec<RaceRecord>,
    skin_variants: Vec<(Variant, FormKey, Vec<FormKey>)>,
}

impl RacePreparation {
    pub fn plan(targets: &[RaceTarget], items: &[EquipmentItem], variants: &IndexMap<FormKey, Variant>) -> Self {
        let items: HashMap<&FormKey, &EquipmentItem> = items.iter().map(|i| (&i.form_key, i)).collect();
        let default_race = FormKey::default_race();
        let mut plan = Self::default();
        let mut seen_races: IndexSet<FormKey> = IndexSet::new();
        let mut seen_variants: IndexSet<FormKey> = IndexSet::new();

        for target in targets {
            for race in std::iter::once(&target.main).chain(&target.additional) {
                if seen_races.insert(race.form_key.clone()) {
                    plan.races.push(race.clone());
                }
            }

            let Some(skin) = target.main.skin.as_ref().and_then(|key| items.get(key)) else {
                tracing::debug!("{} has no skin armor to prepare", target.editor_id());
                continue;
            };
            let additional: Vec<FormKey> = target.additional.iter().map(|r| r.form_key.clone()).collect();

            for variant in skin.armature.iter().filter_map(|key| variants.get(key)) {
                if !is_naked_skin(variant, &default_race, target) {
                    continue;
                }
                if seen_variants.insert(variant.form_key.clone()) {
                    plan.skin_variants
                        .push((variant.clone(), target.main.form_key.clone(), additional.clone()));
                }
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty() && self.skin_variants.is_empty()
    }

    pub fn race_count(&self) -> usize {
        self.races.len()
    }

    pub fn skin_count(&self) -> usize {
        self.skin_variants.len()
    }

    /// Plugins the preparation overrides depend on
    pub fn origins(&self) -> IndexSet<ModKey> {
        self.races
            .iter()
            .map(|r| r.origin().clone())
            .chain(self.skin_variants.iter().map(|(v, _, _)| v.origin().clone()))
            .collect()
    }

    /// Write the overrides into `draft`
    pub fn apply(&self, draft: &mut PluginDraft) {
        for race in &self.races {
            let index = draft.override_race(race);
            draft.race_overrides[index].armor_race = None;
        }
        for (variant, main, additional) in &self.skin_variants {
            let index = draft.override_variant(variant);
            let record = &mut draft.variant_overrides[index];
            record.race = Some(main.clone());
            record.additional_races.clear();
            record.additional_races.extend(additional.iter().cloned());
        }
    }
}

/// Skin addon shared between the default race and exactly this race group
fn is_naked_skin(variant: &Variant, default_race: &FormKey, target: &RaceTarget) -> bool {
    if variant.race.as_ref() != Some(default_race) {
        return false;
    }
    let expected: IndexSet<&FormKey> = std::iter::once(&target.main)
        .chain(&target.additional)
        .map(|r| &r.form_key)
        .collect();
    variant.additional_races.len() == expected.len()
        && variant.additional_races.iter().all(|r| expected.contains(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyParts, Gender};

    fn race(id: u32, plugin: &str, editor_id: &str) -> RaceRecord {
        RaceRecord {
            form_key: FormKey::new(id, ModKey::new(plugin)),
            editor_id: editor_id.to_string(),
            skin: None,
            armor_race: Some(FormKey::default_race()),
        }
    }

    fn races() -> Vec<RaceRecord> {
        vec![
            race(0x13746, "Skyrim.esm", "NordRace"),
            race(0x88794, "Skyrim.esm", "NordRaceVampire"),
            race(0x800, "Lizard.esp", "LizardRace"),
            race(0x801, "Lizard.esp", "LizardRaceVampire"),
            race(0x900, "Lonely.esp", "LonelyRace"),
            race(0xA00, "Night.esp", "NightRaceVampire"),
        ]
    }

    #[test]
    fn test_discover_only_complete_custom_pairs() {
        let pairs = discover_races(&races());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].main.editor_id, "LizardRace");
        assert_eq!(pairs[0].vampire.editor_id, "LizardRaceVampire");
    }

    #[test]
    fn test_resolve_defaults_to_vampire_partner() {
        let target = resolve_race_target("LizardRace", &RaceSettings::default(), &races()).unwrap();
        assert_eq!(target.main.editor_id, "LizardRace");
        assert_eq!(target.additional.len(), 1);
        assert_eq!(target.additional[0].editor_id, "LizardRaceVampire");

        let lonely = resolve_race_target("LonelyRace", &RaceSettings::default(), &races()).unwrap();
        assert!(lonely.additional.is_empty());
    }

    #[test]
    fn test_resolve_configured_additional_races() {
        let settings = RaceSettings {
            additional_races: vec!["LonelyRace".to_string(), "Unknown".to_string()],
            ..RaceSettings::default()
        };
        let err = resolve_race_target("LizardRace", &settings, &races()).unwrap_err();
        assert!(matches!(err, PatchError::RaceNotFound(ref name) if name == "Unknown"));

        let err = resolve_race_target("Missing", &RaceSettings::default(), &races()).unwrap_err();
        assert!(matches!(err, PatchError::RaceNotFound(_)));
    }

    #[test]
    fn test_preparation_overrides_races_and_naked_skin() {
        let all = races();
        let mut main = all[2].clone();
        main.skin = Some(FormKey::new(0x810, ModKey::new("Lizard.esp")));
        let target = RaceTarget {
            main: main.clone(),
            additional: vec![all[3].clone()],
        };

        let skin_variant = |id: u32, extra: Vec<FormKey>| Variant {
            form_key: FormKey::new(id, ModKey::new("Lizard.esp")),
            editor_id: format!("NakedTorso{:X}", id),
            first_person: BodyParts::NONE,
            world_model: None,
            first_person_model: None,
            race: Some(FormKey::default_race()),
            additional_races: extra,
        };
        let naked = skin_variant(0x811, vec![all[3].form_key.clone(), main.form_key.clone()]);
        let shared = skin_variant(0x812, vec![main.form_key.clone()]);
        let variants: IndexMap<FormKey, Variant> = [naked.clone(), shared.clone()]
            .into_iter()
            .map(|v| (v.form_key.clone(), v))
            .collect();
        let skin = EquipmentItem {
            form_key: FormKey::new(0x810, ModKey::new("Lizard.esp")),
            editor_id: Some("SkinNakedLizard".to_string()),
            race: None,
            armature: vec![naked.form_key.clone(), shared.form_key.clone()],
        };

        let plan = RacePreparation::plan(&[target], &[skin], &variants);
        assert_eq!(plan.race_count(), 2);
        assert_eq!(plan.skin_count(), 1);
        assert_eq!(plan.origins().len(), 1);

        let mut draft = PluginDraft::new(ModKey::new("Out.esp"), true);
        plan.apply(&mut draft);
        assert!(draft.race_overrides.iter().all(|r| r.armor_race.is_none()));
        let skin_override = &draft.variant_overrides[0];
        assert_eq!(skin_override.race, Some(main.form_key.clone()));
        assert_eq!(skin_override.additional_races, vec![all[3].form_key.clone()]);
        assert_eq!(skin_override.world_path(Gender::Female), None);
    }
}
