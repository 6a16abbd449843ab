//! The patch pipeline: scan, group, allocate, emit, write.

use crate::metrics::PatchSummary;
use crate::models::{FormKey, GameRelease, GeneralSettings, RaceRecord, RaceSettings, Variant, VersionSettings};
use crate::progress::{Cancellation, ProgressSink, Severity};
use crate::services::allocator::{Limits, OutputAllocator};
use crate::services::classifier::{RaceProfile, RaceTarget};
use crate::services::emitter::{mesh_root, Emitter};
use crate::services::error::PatchError;
use crate::services::graph::{Eligibility, GraphBuilder};
use crate::services::grouping::compile_groups;
use crate::services::provider::GameDataProvider;
use crate::services::races::{resolve_race_target, RacePreparation};
use crate::services::writer::PluginWriter;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// Everything a run needs besides the records and race profiles
#[derive(Debug, Clone)]
pub struct PatchConfig {
    pub limits: Limits,
    pub eligibility: Eligibility,
    /// Directory rewritten mesh paths are checked against
    pub asset_root: Option<Utf8PathBuf>,
    pub output_name: String,
    pub prepare_races: bool,
}

impl PatchConfig {
    /// Assemble the run configuration from stored settings.
    ///
    /// Small-file mode is turned off for releases without light plugin support.
    pub fn from_settings(
        general: &GeneralSettings,
        version: &VersionSettings,
        release: GameRelease,
        data_path: &Utf8Path,
    ) -> Result<Self, PatchError> {
        let mut small_file_mode = version.small_file_mode();
        if small_file_mode && !release.supports_light_plugins() {
            tracing::warn!("{:?} does not support light plugins, disabling ESL flagging", release);
            small_file_mode = false;
        }

        Ok(Self {
            limits: Limits {
                max_new_records: version.max_new_records(),
                max_origins: version.max_plugin_masters(),
                small_file_mode,
            },
            eligibility: Eligibility::new(
                general.ignored_equipment.iter().cloned(),
                general.non_wearable_patterns.iter().cloned(),
                general.skin_prefix.clone(),
            )?,
            asset_root: Some(mesh_root(data_path)),
            output_name: version.output_name().to_string(),
            prepare_races: general.prepare_races,
        })
    }
}

/// Resolve each selected race and compile its settings into a profile.
pub fn build_profiles(
    selections: &[(String, RaceSettings)],
    races: &[RaceRecord],
) -> Result<Vec<RaceProfile>, PatchError> {
    selections
        .iter()
        .map(|(editor_id, settings)| {
            let target = resolve_race_target(editor_id, settings, races)?;
            RaceProfile::from_settings(target, settings)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    Completed,
    /// Stopped on request; plugins holding emitted groups were still written
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub status: PatchStatus,
    pub summary: PatchSummary,
    /// Destination paths handed to the writer, in container order
    pub written: Vec<Utf8PathBuf>,
    pub missing_paths: Vec<String>,
}

/// Runs the pipeline against a provider and hands finished plugins to a writer.
#[derive(Clone)]
pub struct Patcher {
    config: PatchConfig,
    writer: Arc<dyn PluginWriter>,
    sink: Arc<dyn ProgressSink>,
}

impl Patcher {
    pub fn new(config: PatchConfig, writer: Arc<dyn PluginWriter>, sink: Arc<dyn ProgressSink>) -> Self {
        Self { config, writer, sink }
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Run one full patch.
    ///
    /// Capacity failures abort the run with [`PatchError::Config`] after the
    /// plugins that already hold emitted groups have been written.
    pub fn run(
        &self,
        provider: &dyn GameDataProvider,
        profiles: &[RaceProfile],
        output_dir: &Utf8Path,
        cancel: &Cancellation,
    ) -> Result<PatchOutcome, PatchError> {
        let sink = self.sink.as_ref();
        let mut summary = PatchSummary::new();

        let items = provider.equipment_items();
        let variants: IndexMap<FormKey, Variant> = provider
            .variants()
            .into_iter()
            .map(|v| (v.form_key.clone(), v))
            .collect();
        sink.report(
            Severity::Info,
            &format!(
                "Scanning {} armors and {} armor addons for {} race(s)",
                items.len(),
                variants.len(),
                profiles.len()
            ),
        );

        let mut graph = GraphBuilder::new(&self.config.eligibility, profiles).build(&items, &variants, cancel, sink);
        summary.items_scanned = graph.scanned();
        summary.classifications = graph.classifications();
        summary.variants_processed = graph.variants.len();
        if graph.was_cancelled() {
            return Ok(self.finish(PatchStatus::Cancelled, summary, Vec::new(), Vec::new()));
        }

        let groups = compile_groups(&mut graph);
        summary.items_processed = graph.equipment.len();
        summary.groups = groups.len();
        sink.report(
            Severity::Info,
            &format!(
                "Found {} group(s): {} armors, {} new armor addons, {} armor addon overrides",
                groups.len(),
                graph.equipment.len(),
                groups.iter().map(|g| g.new_records).sum::<usize>(),
                groups.iter().map(|g| g.override_records).sum::<usize>()
            ),
        );

        let mut allocator = OutputAllocator::new(self.config.limits, self.config.output_name.clone());
        let mut emitter = Emitter::new(profiles, self.config.asset_root.clone(), sink);
        let mut emitted: IndexSet<usize> = IndexSet::new();

        if self.config.prepare_races {
            let targets: Vec<RaceTarget> = profiles.iter().map(|p| p.target.clone()).collect();
            let plan = RacePreparation::plan(&targets, &items, &variants);
            if !plan.is_empty() {
                let index = match allocator.allocate("race preparation", 0, &plan.origins()) {
                    Ok(index) => index,
                    Err(err) => return Err(self.abort(err.into(), &allocator, &emitted, output_dir)),
                };
                if let Some(container) = allocator.container_mut(index) {
                    plan.apply(&mut container.plugin);
                    emitted.insert(index);
                }
                sink.report(
                    Severity::Info,
                    &format!(
                        "Prepared {} race(s) and {} skin armor addon(s)",
                        plan.race_count(),
                        plan.skin_count()
                    ),
                );
            }
        }

        let mut status = PatchStatus::Completed;
        for group in &groups {
            if cancel.is_cancelled() {
                sink.report(Severity::Warning, "Patch cancelled");
                status = PatchStatus::Cancelled;
                break;
            }

            let label = group.label();
            let index = match allocator.allocate(&label, group.new_records, &group.required_origins) {
                Ok(index) => index,
                Err(err) => return Err(self.abort(err.into(), &allocator, &emitted, output_dir)),
            };
            if let Some(container) = allocator.container_mut(index) {
                emitter.emit_group(&mut graph, group, container);
                emitted.insert(index);
                summary.groups_emitted += 1;
            }
        }

        let stats = *emitter.stats();
        summary.races_appended = stats.races_appended;
        let missing_paths: Vec<String> = emitter.into_missing_paths().into_iter().collect();
        summary.missing_paths = missing_paths.len();
        if !missing_paths.is_empty() {
            sink.report(
                Severity::Warning,
                &format!("{} rewritten mesh path(s) do not exist", missing_paths.len()),
            );
        }

        let written = self.write_containers(&allocator, &emitted, output_dir)?;
        for container in allocator.containers() {
            summary.new_records += container.plugin.new_record_count();
            summary.override_records += container.plugin.override_count();
        }
        summary.containers = written.len();

        Ok(self.finish(status, summary, written, missing_paths))
    }

    fn finish(
        &self,
        status: PatchStatus,
        mut summary: PatchSummary,
        written: Vec<Utf8PathBuf>,
        missing_paths: Vec<String>,
    ) -> PatchOutcome {
        summary.finish();
        summary.log_summary();
        let severity = match status {
            PatchStatus::Completed => Severity::Info,
            PatchStatus::Cancelled => Severity::Warning,
        };
        self.sink.report(severity, &summary.summary());
        PatchOutcome {
            status,
            summary,
            written,
            missing_paths,
        }
    }

    /// Report a fatal error and write what was emitted so far
    fn abort(
        &self,
        err: PatchError,
        allocator: &OutputAllocator,
        emitted: &IndexSet<usize>,
        output_dir: &Utf8Path,
    ) -> PatchError {
        self.sink.report(Severity::Error, &err.to_string());
        tracing::error!("Aborting patch: {}", err);
        match self.write_containers(allocator, emitted, output_dir) {
            Ok(_) => err,
            Err(write_err) => {
                tracing::error!("Failed to write partial output: {}", write_err);
                err
            }
        }
    }

    fn write_containers(
        &self,
        allocator: &OutputAllocator,
        emitted: &IndexSet<usize>,
        output_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, PatchError> {
        let mut written = Vec::new();
        for container in allocator.containers() {
            if !emitted.contains(&container.index()) || container.plugin.is_empty() {
                continue;
            }
            let destination = output_dir.join(container.mod_key().file_name());
            // Race plugins and the default race's master are not part of the group origins
            let masters = container.plugin.masters().len();
            if masters > self.config.limits.max_origins {
                self.sink.report(
                    Severity::Warning,
                    &format!(
                        "{} declares {} masters, above the limit of {}",
                        container.mod_key(),
                        masters,
                        self.config.limits.max_origins
                    ),
                );
            }
            self.sink.report(Severity::Info, &format!("Writing {}", destination));
            if let Err(err) = self.writer.write(container, &destination) {
                self.sink.report(Severity::Error, &err.to_string());
                return Err(err.into());
            }
            written.push(destination);
        }
        Ok(written)
    }
}

/// Run a patch on the blocking thread pool.
///
/// The pipeline itself never yields; this is the only await point.
pub async fn run_patch_task(
    patcher: Patcher,
    provider: Arc<dyn GameDataProvider>,
    profiles: Vec<RaceProfile>,
    output_dir: Utf8PathBuf,
    cancel: Cancellation,
) -> Result<PatchOutcome, PatchError> {
    tokio::task::spawn_blocking(move || patcher.run(provider.as_ref(), &profiles, &output_dir, &cancel)).await?
}
