// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod enrich;
pub mod output;
pub mod registry;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::enrich::{enrich, enrich_with_config, EnrichOutcome};
pub use crate::registry::{RegistryClient, ServerEntry};
