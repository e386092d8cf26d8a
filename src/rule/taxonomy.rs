//! IAB taxonomy mapping seam.
//!
//! The actual taxonomy tables are supplied by the caller; this module only
//! defines the lookup trait, a map-backed implementation and the mapping
//! step of the refinement pipeline.

use std::collections::HashMap;

use crate::config::TaxonomyVersion;

/// Code returned for categories the taxonomy does not know.
pub const UNKNOWN_CODE: &str = "Unknown";

/// Maps internal category names to taxonomy codes.
pub trait TaxonomyMapper: Send + Sync {
    /// Return the code for `category`, or [`UNKNOWN_CODE`].
    fn map_category_to_code(&self, category: &str, version: TaxonomyVersion) -> String;
}

/// Taxonomy backed by per-version lookup tables.
#[derive(Debug, Clone, Default)]
pub struct StaticTaxonomy {
    tables: HashMap<TaxonomyVersion, HashMap<String, String>>,
}

impl StaticTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table for one taxonomy version.
    pub fn with_table<I, K, V>(mut self, version: TaxonomyVersion, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table = self.tables.entry(version).or_default();
        table.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

impl TaxonomyMapper for StaticTaxonomy {
    fn map_category_to_code(&self, category: &str, version: TaxonomyVersion) -> String {
        self.tables
            .get(&version)
            .and_then(|t| t.get(category))
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CODE.to_string())
    }
}

/// Replace every category by its code, deduplicating while keeping order.
pub fn map_categories(
    mapper: &dyn TaxonomyMapper,
    version: TaxonomyVersion,
    categories: &[String],
) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories {
        let code = mapper.map_category_to_code(category, version);
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}
