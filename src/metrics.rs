// Run summary counters
//
// Filled in by the patcher as stages complete and logged once at the end of a run.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Counters describing one patch run
#[derive(Debug, Clone, Serialize)]
pub struct PatchSummary {
    /// Armors looked at before the scan finished or was cancelled
    pub items_scanned: usize,

    /// Armors that ended up in a group
    pub items_processed: usize,

    /// Armor addons with at least one decision
    pub variants_processed: usize,

    /// Classifier invocations (one per addon and race)
    pub classifications: usize,

    pub groups: usize,

    /// Groups actually emitted into an output plugin
    pub groups_emitted: usize,

    /// New armor addons created
    pub new_records: usize,

    /// Armor, armor addon and race overrides
    pub override_records: usize,

    /// Races appended to existing armor addons
    pub races_appended: usize,

    /// Distinct rewritten mesh paths that do not exist
    pub missing_paths: usize,

    /// Output plugins written
    pub containers: usize,

    #[serde(skip)]
    start_time: Instant,

    elapsed_ms: u64,
}

impl PatchSummary {
    pub fn new() -> Self {
        Self {
            items_scanned: 0,
            items_processed: 0,
            variants_processed: 0,
            classifications: 0,
            groups: 0,
            groups_emitted: 0,
            new_records: 0,
            override_records: 0,
            races_appended: 0,
            missing_paths: 0,
            containers: 0,
            start_time: Instant::now(),
            elapsed_ms: 0,
        }
    }

    /// Freeze the elapsed time
    pub fn finish(&mut self) {
        self.elapsed_ms = self.start_time.elapsed().as_millis() as u64;
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// One-line summary for progress output
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} armors", self.items_processed),
            format!("{} new armor addons", self.new_records),
            format!("{} overrides", self.override_records),
            format!("{} plugin(s)", self.containers),
        ];
        if self.missing_paths > 0 {
            parts.push(format!("{} missing meshes", self.missing_paths));
        }
        format!("Processed {}", parts.join(", "))
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Patch Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.elapsed().as_secs_f64());
        tracing::info!(
            "Armors: {} scanned, {} processed in {} groups ({} emitted)",
            self.items_scanned,
            self.items_processed,
            self.groups,
            self.groups_emitted
        );
        tracing::info!(
            "Armor addons: {} processed, {} classifications",
            self.variants_processed,
            self.classifications
        );
        tracing::info!(
            "Records: {} new, {} overrides, {} races appended",
            self.new_records,
            self.override_records,
            self.races_appended
        );
        if self.missing_paths > 0 {
            tracing::warn!("Missing meshes: {}", self.missing_paths);
        }
        tracing::info!("Output plugins: {}", self.containers);
    }
}

impl Default for PatchSummary {
    fn default() -> Self {
        Self::new()
    }
}
