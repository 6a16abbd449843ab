//! Services module - the armor patching pipeline.
//!
//! Everything here is framework-agnostic: no terminal or GUI code, progress goes
//! through an injected [`ProgressSink`](crate::progress::ProgressSink) and all
//! configuration is passed in as values.
//!
//! # Pipeline
//!
//! ```text
//! GameDataProvider -> GraphBuilder (classify) -> compile_groups
//!     -> OutputAllocator -> Emitter -> PluginWriter
//! ```
//!
//! - [`classifier`]: decides per (armor addon, race) whether a race-specific
//!   duplicate is needed ([`Decision::NewDuplicate`]) or the race is simply added
//!   to the existing addon ([`Decision::ExtendOverride`])
//! - [`graph`]: scans eligible armors and builds the armor/addon [`CandidateGraph`],
//!   classifying each (addon, race) pair once
//! - [`grouping`]: splits the graph into connected [`EquipmentGroup`]s, each of
//!   which must live in a single output plugin
//! - [`allocator`]: first-fit placement of groups into output plugins under the
//!   new-record and master ceilings
//! - [`emitter`]: writes duplicates and overrides into the chosen plugin and
//!   tracks missing meshes
//! - [`races`]: custom race discovery, target resolution and race preparation
//! - [`provider`] / [`writer`]: the game data and plugin output boundaries
//! - [`patcher`]: ties the stages together ([`Patcher`], [`run_patch_task`])
//!
//! # Usage Example
//!
//! ```ignore
//! use custom_race_armor::services::{build_profiles, run_patch_task, ManifestWriter, PatchConfig, Patcher};
//!
//! let config = PatchConfig::from_settings(&general, &version, release, &data_path)?;
//! let profiles = build_profiles(&selections, &provider.races())?;
//! let patcher = Patcher::new(config, Arc::new(ManifestWriter), Arc::new(TracingSink));
//!
//! let outcome = run_patch_task(patcher, provider, profiles, output_dir, cancel).await?;
//! println!("{}", outcome.summary.summary());
//! ```

pub mod allocator;
pub mod classifier;
pub mod emitter;
pub mod error;
pub mod graph;
pub mod grouping;
pub mod patcher;
pub mod provider;
pub mod races;
pub mod writer;

pub use allocator::{Limits, OutputAllocator};
pub use classifier::{classify, Decision, PathRule, RaceProfile, RaceTarget};
pub use emitter::{EmitStats, Emitter};
pub use error::{ConfigError, PatchError};
pub use graph::{CandidateGraph, Eligibility, EquipmentInfo, GraphBuilder, RaceDecision, VariantInfo};
pub use grouping::{compile_group, compile_groups, EquipmentGroup};
pub use patcher::{build_profiles, run_patch_task, PatchConfig, PatchOutcome, PatchStatus, Patcher};
pub use provider::{GameDataProvider, RecordSnapshot, SnapshotProvider};
pub use races::{discover_races, resolve_race_target, RacePair, RacePreparation};
pub use writer::{clear_previous_outputs, ManifestWriter, PluginWriter, WriterError};
