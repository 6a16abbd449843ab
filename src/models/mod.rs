//! Data models for the armor patcher.
//!
//! - [`records`]: read-only views of armors ([`EquipmentItem`]), armor addons
//!   ([`Variant`]) and races ([`RaceRecord`]) as supplied by a game data provider
//! - [`config`]: settings persisted as YAML ([`GeneralSettings`], [`UserSettings`],
//!   [`RaceSettings`])
//! - [`plugin`]: output drafts ([`PluginDraft`]) and the allocator's
//!   [`OutputContainer`]
//!
//! Record views are immutable for the duration of a run. Everything the run
//! produces lands in a [`PluginDraft`] owned by one [`OutputContainer`].

pub mod config;
pub mod plugin;
pub mod records;

pub use config::{
    GameRelease, GeneralSettings, PathRuleSettings, RaceSettings, UserSettings, VersionSettings,
};
pub use plugin::{OutputContainer, PluginDraft};
pub use records::{
    BodyParts, EquipmentItem, FormKey, Gender, GenderedModel, ModKey, RaceRecord, Variant,
};
