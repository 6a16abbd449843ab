//! Per-(variant, race) classification: new race-specific duplicate or in-place extension.
//!
//! A custom race whose body meshes differ from the vanilla ones (for example
//! digitigrade legs) needs its own armor addon for every slot it replaces,
//! pointing at meshes rebuilt for that body. Every other addon only needs the
//! race added to its compatibility list.

use crate::models::{BodyParts, Gender, RaceRecord, RaceSettings, Variant};
use crate::services::error::PatchError;
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;

/// A compiled model path rewrite: case-insensitive pattern plus replacement template.
///
/// The template uses `regex` replacement syntax (`$1`, `${name}`, `$$`), except
/// that an unbraced group number ends at the last digit: `$1_lizard` is group 1
/// followed by `_lizard`. Every match in the path is replaced.
#[derive(Debug, Clone)]
pub struct PathRule {
    pattern: Regex,
    replacement: String,
}

impl PathRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            pattern,
            replacement: brace_group_numbers(&replacement.into()),
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    pub fn apply<'p>(&self, path: &'p str) -> Cow<'p, str> {
        self.pattern.replace_all(path, self.replacement.as_str())
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Rewrite each unbraced `$<digits>` to `${<digits>}`.
///
/// `regex` reads `$1_x` as the (missing) group `1_x`; path templates mean group 1.
fn brace_group_numbers(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 4);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some(d) if d.is_ascii_digit() => {
                out.push_str("${");
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    out.push(d);
                }
                out.push('}');
            }
            _ => out.push('$'),
        }
    }
    out
}

/// A race being augmented plus the races that always travel with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceTarget {
    pub main: RaceRecord,
    pub additional: Vec<RaceRecord>,
}

impl RaceTarget {
    pub fn editor_id(&self) -> &str {
        &self.main.editor_id
    }
}

/// Everything the classifier and emitter need to know about one race.
#[derive(Debug, Clone)]
pub struct RaceProfile {
    pub target: RaceTarget,
    /// Slots the race replaces with custom meshes
    pub custom_parts: BodyParts,
    pub process_male: bool,
    pub process_female: bool,
    male_rules: Vec<PathRule>,
    female_rules: Vec<PathRule>,
}

impl RaceProfile {
    pub fn new(
        target: RaceTarget,
        custom_parts: BodyParts,
        process_male: bool,
        process_female: bool,
        male_rules: Vec<PathRule>,
        female_rules: Vec<PathRule>,
    ) -> Self {
        Self {
            target,
            custom_parts,
            process_male,
            process_female,
            male_rules,
            female_rules,
        }
    }

    /// Build a profile from stored settings, compiling the path rules.
    ///
    /// Rules without a gender are added to both lists; stored order is kept.
    pub fn from_settings(target: RaceTarget, settings: &RaceSettings) -> Result<Self, PatchError> {
        let mut male_rules = Vec::new();
        let mut female_rules = Vec::new();
        for rule in &settings.path_rules {
            let compiled = PathRule::new(&rule.pattern, rule.replacement.clone())
                .map_err(|source| PatchError::InvalidPathRule {
                    race: target.main.editor_id.clone(),
                    pattern: rule.pattern.clone(),
                    source,
                })?;
            match rule.gender {
                Some(Gender::Male) => male_rules.push(compiled),
                Some(Gender::Female) => female_rules.push(compiled),
                None => {
                    male_rules.push(compiled.clone());
                    female_rules.push(compiled);
                }
            }
        }

        Ok(Self::new(
            target,
            BodyParts {
                head: settings.custom_head,
                body: settings.custom_body,
                hands: settings.custom_hands,
                feet: settings.custom_feet,
            },
            settings.process_male,
            settings.process_female,
            male_rules,
            female_rules,
        ))
    }

    pub fn processes(&self, gender: Gender) -> bool {
        match gender {
            Gender::Male => self.process_male,
            Gender::Female => self.process_female,
        }
    }

    pub fn rules(&self, gender: Gender) -> &[PathRule] {
        match gender {
            Gender::Male => &self.male_rules,
            Gender::Female => &self.female_rules,
        }
    }

    pub fn rule(&self, gender: Gender, index: usize) -> Option<&PathRule> {
        self.rules(gender).get(index)
    }
}

/// Outcome of classifying one (variant, race) pair.
///
/// Rule matches are stored as indices into the race's per-gender rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    NewDuplicate {
        male_rule: Option<usize>,
        female_rule: Option<usize>,
    },
    ExtendOverride,
}

impl Decision {
    pub fn new_records(&self) -> usize {
        match self {
            Decision::NewDuplicate { .. } => 1,
            Decision::ExtendOverride => 0,
        }
    }

    pub fn override_records(&self) -> usize {
        match self {
            Decision::NewDuplicate { .. } => 0,
            Decision::ExtendOverride => 1,
        }
    }

    pub fn rule_for(&self, gender: Gender) -> Option<usize> {
        match (self, gender) {
            (Decision::NewDuplicate { male_rule, .. }, Gender::Male) => *male_rule,
            (Decision::NewDuplicate { female_rule, .. }, Gender::Female) => *female_rule,
            (Decision::ExtendOverride, _) => None,
        }
    }
}

/// Decide whether `variant` needs a race-specific duplicate for `profile`.
///
/// Pure: the same inputs always give the same decision.
pub fn classify(variant: &Variant, profile: &RaceProfile) -> Decision {
    let Some(world_model) = variant.world_model.as_ref() else {
        return Decision::ExtendOverride;
    };

    if !profile.custom_parts.intersects(&variant.first_person) {
        return Decision::ExtendOverride;
    }

    let first_match = |gender: Gender| -> Option<usize> {
        if !profile.processes(gender) {
            return None;
        }
        let path = world_model.get(gender)?;
        profile.rules(gender).iter().position(|rule| rule.is_match(path))
    };

    let male_rule = first_match(Gender::Male);
    let female_rule = first_match(Gender::Female);

    if male_rule.is_some() || female_rule.is_some() {
        Decision::NewDuplicate {
            male_rule,
            female_rule,
        }
    } else {
        Decision::ExtendOverride
    }
}
