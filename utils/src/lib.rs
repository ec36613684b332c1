//! Shared infrastructure utilities for Agentdeck.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)

pub mod atomic_write;

pub use atomic_write::{AtomicWriteOptions, PersistMode, atomic_write_with_options, recover_bak_file};
