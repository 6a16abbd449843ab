//! Read-only views of the game records the patcher works on.
//!
//! These mirror the subset of the Skyrim record layout that matters for
//! race compatibility: armors ([`EquipmentItem`]), armor addons ([`Variant`])
//! and races ([`RaceRecord`]). Everything here is supplied by a
//! [`GameDataProvider`](crate::services::GameDataProvider) with load-order
//! conflicts already resolved.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Master file that owns every vanilla race, including the default race.
pub const BASE_MASTER: &str = "Skyrim.esm";

/// Local form id of `DefaultRace` inside [`BASE_MASTER`].
pub const DEFAULT_RACE_ID: u32 = 0x000019;

/// Identifier of a plugin file (`Skyrim.esm`, `MyRace.esp`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModKey(String);

impl ModKey {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self(file_name.into())
    }

    /// Full file name including the extension
    pub fn file_name(&self) -> &str {
        &self.0
    }

    /// File name without the extension
    pub fn name(&self) -> &str {
        self.0.rsplit_once('.').map_or(self.0.as_str(), |(stem, _)| stem)
    }

    pub fn is_base_master(&self) -> bool {
        self.0.eq_ignore_ascii_case(BASE_MASTER)
    }
}

impl fmt::Display for ModKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormKeyParseError {
    #[error("form key {0:?} is missing the ':' separator")]
    MissingSeparator(String),

    #[error("form key {0:?} has an invalid hex id")]
    InvalidId(String),

    #[error("form key {0:?} has an empty plugin name")]
    EmptyOrigin(String),
}

/// Globally unique record identifier: local id plus the plugin that defines it.
///
/// Serialized as `"00ABCD:Plugin.esp"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormKey {
    pub id: u32,
    pub origin: ModKey,
}

impl FormKey {
    pub fn new(id: u32, origin: ModKey) -> Self {
        Self { id, origin }
    }

    /// The vanilla default race every wearable armor addon is authored against
    pub fn default_race() -> Self {
        Self::new(DEFAULT_RACE_ID, ModKey::new(BASE_MASTER))
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}:{}", self.id, self.origin)
    }
}

impl std::str::FromStr for FormKey {
    type Err = FormKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, origin) = s
            .split_once(':')
            .ok_or_else(|| FormKeyParseError::MissingSeparator(s.to_string()))?;
        let id = u32::from_str_radix(id.trim(), 16)
            .map_err(|_| FormKeyParseError::InvalidId(s.to_string()))?;
        let origin = origin.trim();
        if origin.is_empty() {
            return Err(FormKeyParseError::EmptyOrigin(s.to_string()));
        }
        Ok(Self::new(id, ModKey::new(origin)))
    }
}

impl TryFrom<String> for FormKey {
    type Error = FormKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormKey> for String {
    fn from(value: FormKey) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("male"),
            Gender::Female => f.write_str("female"),
        }
    }
}

/// First-person body slots relevant to custom race bodies.
///
/// Used both for a variant's own slot flags and for the slots a race
/// replaces with custom meshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyParts {
    pub head: bool,
    pub body: bool,
    pub hands: bool,
    pub feet: bool,
}

impl BodyParts {
    pub const NONE: BodyParts = BodyParts {
        head: false,
        body: false,
        hands: false,
        feet: false,
    };

    /// True when at least one slot is set in both
    pub fn intersects(&self, other: &BodyParts) -> bool {
        (self.head && other.head)
            || (self.body && other.body)
            || (self.hands && other.hands)
            || (self.feet && other.feet)
    }

    pub fn is_empty(&self) -> bool {
        !(self.head || self.body || self.hands || self.feet)
    }
}

/// Per-gender mesh paths, relative to the `meshes` folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenderedModel {
    pub male: Option<String>,
    pub female: Option<String>,
}

impl GenderedModel {
    pub fn get(&self, gender: Gender) -> Option<&str> {
        match gender {
            Gender::Male => self.male.as_deref(),
            Gender::Female => self.female.as_deref(),
        }
    }

    pub fn set(&mut self, gender: Gender, path: String) {
        match gender {
            Gender::Male => self.male = Some(path),
            Gender::Female => self.female = Some(path),
        }
    }
}

/// An armor record: the wearable item that references one or more variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub form_key: FormKey,
    #[serde(default)]
    pub editor_id: Option<String>,
    /// Armor race the item is authored for
    #[serde(default)]
    pub race: Option<FormKey>,
    /// Referenced variants (armature), in record order
    #[serde(default)]
    pub armature: Vec<FormKey>,
}

impl EquipmentItem {
    pub fn origin(&self) -> &ModKey {
        &self.form_key.origin
    }

    pub fn name(&self) -> &str {
        self.editor_id.as_deref().unwrap_or("<unnamed>")
    }
}

/// An armor addon record: the per-body-region model used by an armor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub form_key: FormKey,
    pub editor_id: String,
    /// First-person biped slots this variant occupies
    #[serde(default)]
    pub first_person: BodyParts,
    #[serde(default)]
    pub world_model: Option<GenderedModel>,
    #[serde(default)]
    pub first_person_model: Option<GenderedModel>,
    #[serde(default)]
    pub race: Option<FormKey>,
    #[serde(default)]
    pub additional_races: Vec<FormKey>,
}

impl Variant {
    pub fn origin(&self) -> &ModKey {
        &self.form_key.origin
    }

    /// True when the race is the primary race or listed as additional race
    pub fn supports_race(&self, race: &FormKey) -> bool {
        self.race.as_ref() == Some(race) || self.additional_races.contains(race)
    }

    pub fn world_path(&self, gender: Gender) -> Option<&str> {
        self.world_model.as_ref().and_then(|m| m.get(gender))
    }
}

/// A race record, as far as armor compatibility is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub form_key: FormKey,
    pub editor_id: String,
    /// Naked skin armor of the race
    #[serde(default)]
    pub skin: Option<FormKey>,
    /// Race whose armor addons this race borrows
    #[serde(default)]
    pub armor_race: Option<FormKey>,
}

impl RaceRecord {
    pub fn origin(&self) -> &ModKey {
        &self.form_key.origin
    }
}
