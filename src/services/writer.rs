//! Output plugin serialization boundary.

use crate::models::{ModKey, OutputContainer, PluginDraft};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use std::fs;
use thiserror::Error;

/// Failure to write one output plugin
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {mod_key}: {message}")]
    Serialize { mod_key: String, message: String },

    #[error("Writer rejected {0}")]
    Rejected(String),
}

/// Serializes a finished container to `destination`
#[cfg_attr(test, mockall::automock)]
pub trait PluginWriter: Send + Sync {
    fn write(&self, container: &OutputContainer, destination: &Utf8Path) -> Result<(), WriterError>;
}

#[derive(Serialize)]
struct Manifest<'a> {
    masters: Vec<&'a ModKey>,
    new_records: usize,
    overrides: usize,
    #[serde(flatten)]
    plugin: &'a PluginDraft,
}

/// Writes a human-readable YAML manifest of each container to
/// `<destination>.yaml` instead of a binary plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestWriter;

impl ManifestWriter {
    pub fn manifest_path(destination: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.yaml", destination))
    }
}

impl PluginWriter for ManifestWriter {
    fn write(&self, container: &OutputContainer, destination: &Utf8Path) -> Result<(), WriterError> {
        let plugin = &container.plugin;
        let masters = plugin.masters();
        let manifest = Manifest {
            masters: masters.iter().collect(),
            new_records: plugin.new_record_count(),
            overrides: plugin.override_count(),
            plugin,
        };
        let yaml = serde_yaml_ng::to_string(&manifest).map_err(|e| WriterError::Serialize {
            mod_key: plugin.mod_key.to_string(),
            message: e.to_string(),
        })?;

        let path = Self::manifest_path(destination);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| WriterError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, yaml).map_err(|source| WriterError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            "Wrote {} ({} new, {} overrides, {} masters)",
            path,
            plugin.new_record_count(),
            plugin.override_count(),
            masters.len()
        );
        Ok(())
    }
}

/// Delete earlier outputs named `<output_name>.esp`, `<output_name>_N.esp`
/// (and their manifests) from `dir`. Returns the deleted paths.
pub fn clear_previous_outputs(dir: &Utf8Path, output_name: &str) -> std::io::Result<Vec<Utf8PathBuf>> {
    let mut removed = Vec::new();
    if !dir.is_dir() {
        return Ok(removed);
    }

    let pattern = format!(r"(?i)^{}(?:_\d+)?\.esp(?:\.yaml)?$", regex::escape(output_name));
    let re = Regex::new(&pattern).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() && re.is_match(entry.file_name()) {
            fs::remove_file(entry.path())?;
            tracing::debug!("Removed previous output {}", entry.path());
            removed.push(entry.path().to_path_buf());
        }
    }
    Ok(removed)
}
