//! hostcat - categorise URLs, domains and IPs against published blocklists.
//!
//! Named categories are assembled from remote or local host lists in any of
//! the common list formats (hosts files, dnsmasq, uBlock/AdBlock, plain
//! domains) and from other categories by reference. Queries are answered by
//! suffix matching against the assembled graph, then refined by smart rules,
//! regex content patterns and optional IAB taxonomy mapping.
//!
//! # Features
//!
//! - **List formats**: automatic detection of hosts/dnsmasq/uBlock/plain lists
//! - **Cached fetching**: 24h disk cache validated with ETag/Last-Modified
//! - **Category references**: categories built from other categories
//! - **Smart rules**: per-domain corrections for well-known sites
//! - **Datasets**: CSV and Kaggle datasets merged with provenance
//!
//! # Quick Start
//!
//! ```ignore
//! use hostcat::{CategoryMap, Client, Config};
//!
//! let categories = CategoryMap::from_pairs(vec![
//!     ("malware", vec!["https://example.com/malware-hosts.txt"]),
//!     ("ads", vec!["https://example.com/ads.txt"]),
//!     ("threats", vec!["malware"]),
//! ]);
//! let client = Client::new(Config::with_categories(categories))?;
//!
//! assert_eq!(
//!     client.categorise("https://x.bad.example/path")?,
//!     vec!["malware", "threats"]
//! );
//! ```
//!
//! # Datasets
//!
//! ```ignore
//! use hostcat::dataset::{ColumnMappings, ProcessOptions};
//!
//! let result = client.load_csv_dataset(
//!     "https://example.com/sites.csv",
//!     &ProcessOptions::default(),
//!     &ColumnMappings::default(),
//! )?;
//! println!("{} domains merged", result.domain_count());
//! ```

mod client;
mod error;
mod metadata;
mod resolve;
mod store;

pub mod config;
pub mod converter;
pub mod dataset;
pub mod fetch;
pub mod graph;
pub mod host;
pub mod rule;

// Re-export core types
pub use client::Client;
pub use config::{CategoryMap, Config, DatasetConfig, IabConfig, TaxonomyVersion};
pub use error::{Error, FetchError, Result};
pub use graph::{CategoryGraph, GraphStats};
pub use metadata::{FetchMetadata, FetchStatus};
pub use store::HostStore;

// Re-export collaborator seams
pub use resolve::{resolver_for, DnsResolver, ServerListResolver, SystemResolver};
pub use rule::{StaticTaxonomy, TaxonomyMapper};
