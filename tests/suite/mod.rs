//! Integration test modules.

mod file_store;
mod save_cycle;
