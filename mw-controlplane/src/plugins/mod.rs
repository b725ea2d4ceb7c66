//! C7: read-only helpers that never hold write locks on anything — a
//! duplicate-name detector run against the live upstream, and a per-process
//! TTL-cached fetch of the public Traefik plugin catalogue.

mod catalogue;
mod duplicates;

pub use catalogue::{CataloguePlugin, PluginCatalogue};
pub use duplicates::{DuplicateCheckResult, DuplicateDetector};
