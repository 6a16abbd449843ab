use crate::models::records::Gender;
use crate::progress::Severity;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Default ceiling on masters per plugin (the format allows 255 including itself).
pub const DEFAULT_MAX_PLUGIN_MASTERS: usize = 254;

/// Default ceiling on new records in a light plugin (ids 0x800..=0xFFF).
pub const DEFAULT_MAX_NEW_RECORDS: usize = 2048;

pub const DEFAULT_OUTPUT_NAME: &str = "CustomRacesArmor";

/// General settings from `CRA General.yaml`
///
/// Shared by every race and every game release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Editor ids of equipment that is never patched
    pub ignored_equipment: Vec<String>,

    /// Case-insensitive patterns over world model paths marking
    /// equipment that is not real armor (creature parts, effects)
    pub non_wearable_patterns: Vec<String>,

    /// Editor id prefix of the internal naked-skin armors
    pub skin_prefix: String,

    /// Override race records and naked-skin addons of each processed race
    pub prepare_races: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            ignored_equipment: Vec::new(),
            non_wearable_patterns: vec![
                r"^(?:dlc\d+\\)?actors\\".to_string(),
                r"^(?:dlc\d+\\)?effects\\".to_string(),
            ],
            skin_prefix: "SkinNaked".to_string(),
            prepare_races: true,
        }
    }
}

/// Supported game releases
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum GameRelease {
    SkyrimLe,
    #[default]
    SkyrimSe,
    SkyrimSeGog,
    SkyrimVr,
    EnderalSe,
}

impl GameRelease {
    /// Whether the release understands light (ESL-flagged) plugins
    pub fn supports_light_plugins(&self) -> bool {
        !matches!(self, GameRelease::SkyrimLe)
    }
}

/// User settings from `CRA User.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub log_level: Severity,
    pub versions: Vec<VersionSettings>,
}

impl UserSettings {
    /// Settings for a release, falling back to defaults when none were saved
    pub fn for_release(&self, release: GameRelease) -> VersionSettings {
        self.versions
            .iter()
            .find(|v| v.release == release)
            .cloned()
            .unwrap_or_else(|| VersionSettings {
                release,
                ..VersionSettings::default()
            })
    }

    /// Insert or replace the settings for one release
    pub fn set_release(&mut self, settings: VersionSettings) {
        match self.versions.iter_mut().find(|v| v.release == settings.release) {
            Some(existing) => *existing = settings,
            None => self.versions.push(settings),
        }
    }
}

/// Per-release user settings. Unset values fall back to the defaults above.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionSettings {
    pub release: GameRelease,
    pub custom_data_path: Option<Utf8PathBuf>,
    pub output_name: Option<String>,
    pub selected_races: Vec<String>,
    /// Small-file mode: flag outputs as light plugins and cap new records
    pub flag_esl: Option<bool>,
    pub max_plugin_masters: Option<usize>,
    pub max_new_records: Option<usize>,
}

impl VersionSettings {
    pub fn output_name(&self) -> &str {
        self.output_name.as_deref().unwrap_or(DEFAULT_OUTPUT_NAME)
    }

    pub fn small_file_mode(&self) -> bool {
        self.flag_esl.unwrap_or(true)
    }

    pub fn max_plugin_masters(&self) -> usize {
        self.max_plugin_masters.unwrap_or(DEFAULT_MAX_PLUGIN_MASTERS)
    }

    pub fn max_new_records(&self) -> usize {
        self.max_new_records.unwrap_or(DEFAULT_MAX_NEW_RECORDS)
    }
}

/// One model path rewrite rule as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRuleSettings {
    pub pattern: String,
    pub replacement: String,
    /// Restrict the rule to one gender; unset applies to both
    #[serde(default)]
    pub gender: Option<Gender>,
}

/// Per-race settings from `RaceSettings/<EditorID>.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceSettings {
    pub custom_head: bool,
    pub custom_body: bool,
    pub custom_hands: bool,
    pub custom_feet: bool,
    pub process_male: bool,
    pub process_female: bool,
    pub path_rules: Vec<PathRuleSettings>,
    /// Races that always travel with this one; empty means the vampire partner
    pub additional_races: Vec<String>,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            custom_head: false,
            custom_body: true,
            custom_hands: false,
            custom_feet: true,
            process_male: false,
            process_female: true,
            path_rules: vec![PathRuleSettings {
                pattern: "(.+)".to_string(),
                replacement: r"Patched\$1".to_string(),
                gender: None,
            }],
            additional_races: Vec::new(),
        }
    }
}
