//! Settings reconciliation logic for Agentdeck.
//!
//! Decoding a loosely-typed settings document into editable lists, encoding
//! them back, assembling the document to persist, and the contracts of the
//! external services that store it. Nothing here holds state between calls.

mod assemble;
mod env;
pub mod installations;
mod rules;
pub mod services;

pub use assemble::assemble;
pub use env::{decode_env, encode_env};
pub use installations::{Installation, InstallationSource, discover_installations, select_best};
pub use rules::{decode_rules, encode_rules};
pub use services::{CheckpointService, ServiceError, ServiceFut, SettingsStore};
