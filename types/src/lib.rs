//! Core domain types for Agentdeck.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod checkpoint;
mod ids;
mod language;
mod proxy;
mod section;
pub mod settings;

pub use checkpoint::{
    CheckpointScope, CheckpointSettings, CheckpointStrategy, KeepCount, KeepCountError,
};
pub use ids::EntryId;
pub use language::Language;
pub use proxy::ProxySettings;
pub use section::Section;
pub use settings::{
    EnvironmentVariable, NotAnObject, PermissionRule, RuleKind, SettingsDocument, json_type_name,
};
