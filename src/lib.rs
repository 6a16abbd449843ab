// Custom Race Armor - lets custom races wear existing armor in Bethesda games
//
// This is the library crate containing the patch pipeline and data structures.
// The binary crate (main.rs) provides the command line front end.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod progress;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::PatchSummary;
pub use models::{GameRelease, GeneralSettings, RaceSettings, UserSettings, VersionSettings};
pub use progress::{Cancellation, ChannelSink, ProgressEvent, ProgressSink, Severity, TracingSink};
pub use services::{PatchConfig, PatchError, PatchOutcome, PatchStatus, Patcher};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
