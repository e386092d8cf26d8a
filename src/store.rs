//! Persistence seam for precomputed host categories.

use crate::dataset::DatasetMetadata;
use crate::metadata::FetchMetadata;

/// External store consulted before the in-memory graph.
///
/// A non-empty answer from [`HostStore::categorise`] replaces the graph
/// lookup; an empty one falls through to it. The recording hooks let a store
/// keep fetch and dataset provenance and default to doing nothing.
pub trait HostStore: Send + Sync {
    /// Raw categories for a normalised host.
    fn categorise(&self, host: &str) -> Vec<String>;

    /// Raw categories for an IP string.
    fn categorise_ip(&self, ip: &str) -> Vec<String>;

    fn record_fetch(&self, _metadata: &FetchMetadata) {}

    fn record_dataset(&self, _metadata: &DatasetMetadata) {}
}
