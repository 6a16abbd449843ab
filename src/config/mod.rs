use crate::models::{GeneralSettings, RaceSettings, UserSettings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Prefix of environment variables overriding general settings (`CRA_SKIN_PREFIX`, ...)
pub const ENV_PREFIX: &str = "CRA";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages three kinds of configuration:
/// - General settings (`CRA General.yaml`): ignore list, non-wearable patterns, skin prefix
/// - User settings (`CRA User.yaml`): log level and per-release settings
/// - Race settings (`RaceSettings/<EditorID>.yaml`): one file per custom race
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    general_settings_path: Utf8PathBuf,
    user_settings_path: Utf8PathBuf,
    race_settings_dir: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "CRA Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            general_settings_path: config_dir.join("CRA General.yaml"),
            user_settings_path: config_dir.join("CRA User.yaml"),
            race_settings_dir: config_dir.join("RaceSettings"),
            config_dir,
        })
    }

    /// Load the general settings.
    ///
    /// `CRA_*` environment variables override values from the file. A file
    /// with default values is written when none exists yet.
    pub fn load_general_settings(&self) -> Result<GeneralSettings> {
        if !self.general_settings_path.exists() {
            tracing::warn!(
                "General settings not found at {}, writing defaults",
                self.general_settings_path
            );
            self.save_general_settings(&GeneralSettings::default())?;
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::from(self.general_settings_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ignored_equipment")
                    .with_list_parse_key("non_wearable_patterns"),
            )
            .build()
            .with_context(|| format!("Failed to read general settings: {}", self.general_settings_path))?;

        let general: GeneralSettings = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse general settings: {}", self.general_settings_path))?;

        tracing::info!("Loaded general settings from {}", self.general_settings_path);
        Ok(general)
    }

    pub fn save_general_settings(&self, settings: &GeneralSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize general settings to YAML")?;

        fs::write(&self.general_settings_path, yaml_string)
            .with_context(|| format!("Failed to write general settings: {}", self.general_settings_path))?;

        tracing::info!("Saved general settings to {}", self.general_settings_path);
        Ok(())
    }

    /// Load the user settings, or defaults if the file doesn't exist
    pub fn load_user_settings(&self) -> Result<UserSettings> {
        if !self.user_settings_path.exists() {
            tracing::warn!("User settings not found at {}, using defaults", self.user_settings_path);
            return Ok(UserSettings::default());
        }

        let file_contents = fs::read_to_string(&self.user_settings_path)
            .with_context(|| format!("Failed to read user settings: {}", self.user_settings_path))?;

        let settings: UserSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user settings: {}", self.user_settings_path))?;

        tracing::info!("Loaded user settings from {}", self.user_settings_path);
        Ok(settings)
    }

    pub fn save_user_settings(&self, settings: &UserSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize user settings to YAML")?;

        fs::write(&self.user_settings_path, yaml_string)
            .with_context(|| format!("Failed to write user settings: {}", self.user_settings_path))?;

        tracing::info!("Saved user settings to {}", self.user_settings_path);
        Ok(())
    }

    pub fn race_settings_path(&self, editor_id: &str) -> Utf8PathBuf {
        self.race_settings_dir.join(format!("{}.yaml", editor_id))
    }

    pub fn race_settings_exist(&self, editor_id: &str) -> bool {
        self.race_settings_path(editor_id).exists()
    }

    /// Load the settings of one race, or defaults if none were saved
    pub fn load_race_settings(&self, editor_id: &str) -> Result<RaceSettings> {
        let path = self.race_settings_path(editor_id);
        if !path.exists() {
            tracing::debug!("No race settings for {}, using defaults", editor_id);
            return Ok(RaceSettings::default());
        }

        let file_contents =
            fs::read_to_string(&path).with_context(|| format!("Failed to read race settings: {}", path))?;

        let settings: RaceSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse race settings: {}", path))?;

        tracing::debug!("Loaded race settings from {}", path);
        Ok(settings)
    }

    pub fn save_race_settings(&self, editor_id: &str, settings: &RaceSettings) -> Result<()> {
        if !self.race_settings_dir.exists() {
            fs::create_dir_all(&self.race_settings_dir).with_context(|| {
                format!("Failed to create race settings directory: {}", self.race_settings_dir)
            })?;
        }

        let path = self.race_settings_path(editor_id);
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize race settings to YAML")?;

        fs::write(&path, yaml_string).with_context(|| format!("Failed to write race settings: {}", path))?;

        tracing::info!("Saved race settings to {}", path);
        Ok(())
    }

    /// Load the settings of every selected race, keyed by editor id
    pub fn load_race_selections(&self, editor_ids: &[String]) -> Result<Vec<(String, RaceSettings)>> {
        editor_ids
            .iter()
            .map(|id| Ok((id.clone(), self.load_race_settings(id)?)))
            .collect()
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
