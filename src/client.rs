//! The categorisation client: graph, refinement, datasets and DNS behind one
//! handle.

use std::collections::{BTreeMap, HashMap};
use std::mem;

use crate::config::Config;
use crate::dataset::{
    integrate_dataset_into_categorization, ColumnMappings, Dataset, DatasetHistory,
    DatasetProcessor, IntegrationResult, ProcessOptions,
};
use crate::fetch::SourceFetcher;
use crate::graph::{CategoryGraph, GraphBuilder, GraphStats};
use crate::host::extract_host;
use crate::metadata::FetchMetadata;
use crate::resolve::{resolver_for, DnsResolver};
use crate::rule::{PatternTable, Refiner, RuleEngine, TaxonomyMapper};
use crate::store::HostStore;
use crate::{Error, Result};

/// Categorises URLs, domains and IPs against configured blocklists.
///
/// # Example
///
/// ```ignore
/// use hostcat::{Client, Config};
///
/// let config = Config::load("hostcat.yaml")?;
/// let client = Client::new(config)?;
///
/// let categories = client.categorise("https://ads.example.com/banner")?;
/// println!("{:?}", categories);
/// ```
pub struct Client {
    config: Config,
    fetcher: SourceFetcher,
    graph: CategoryGraph,
    /// Metadata of the last fetch of every source URL
    fetches: HashMap<String, FetchMetadata>,
    refiner: Refiner,
    resolver: Box<dyn DnsResolver>,
    store: Option<Box<dyn HostStore>>,
    datasets: Option<DatasetProcessor>,
    history: DatasetHistory,
    /// Dataset categories merged so far, re-applied on reload
    merged: Vec<BTreeMap<String, Vec<String>>>,
}

impl Client {
    /// Build the category graph and refinement pipeline from `config`.
    ///
    /// Unreachable sources are recorded as failed and do not stop the
    /// build; a category reference cycle does.
    pub fn new(config: Config) -> Result<Self> {
        let mut fetcher = SourceFetcher::new(config.timeout()).with_force_refresh(config.force_refresh);
        if let Some(dir) = &config.cache_dir {
            fetcher = fetcher.with_cache_dir(dir);
        }

        let datasets = match &config.dataset {
            Some(dataset) => Some(DatasetProcessor::new(dataset.clone())?),
            None => None,
        };

        let mut client = Self {
            refiner: build_refiner(&config),
            resolver: resolver_for(&config.dns_servers, config.timeout()),
            fetcher,
            graph: CategoryGraph::new(),
            fetches: HashMap::new(),
            store: None,
            datasets,
            history: DatasetHistory::new(),
            merged: Vec::new(),
            config,
        };
        client.reload()?;
        Ok(client)
    }

    /// Attach a taxonomy for code mapping. Ignored unless `iab.enabled`.
    pub fn with_taxonomy(mut self, mapper: Box<dyn TaxonomyMapper>) -> Self {
        if self.config.iab.enabled {
            let version = self.config.iab.version;
            self.refiner = mem::take(&mut self.refiner).with_taxonomy(mapper, version);
        } else {
            log::debug!("IAB mapping disabled, taxonomy not attached");
        }
        self
    }

    /// Replace the DNS resolver chosen from `dns_servers`.
    pub fn with_resolver(mut self, resolver: Box<dyn DnsResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Consult `store` before the in-memory graph.
    pub fn with_store(mut self, store: Box<dyn HostStore>) -> Self {
        for metadata in self.fetches.values() {
            store.record_fetch(metadata);
        }
        self.store = Some(store);
        self
    }

    /// Re-fetch every source and rebuild the graph.
    ///
    /// Previously merged dataset categories are merged again.
    pub fn reload(&mut self) -> Result<()> {
        let output = GraphBuilder::new(&self.fetcher).build(&self.config.categories)?;
        let mut graph = output.graph;
        for categories in &self.merged {
            graph.merge_dataset(categories);
        }

        if let Some(store) = &self.store {
            for metadata in output.fetches.values() {
                store.record_fetch(metadata);
            }
        }

        let failed = output.fetches.values().filter(|m| !m.is_success()).count();
        log::info!(
            "Loaded {} categories with {} hosts ({} of {} sources failed)",
            graph.len(),
            graph.host_count(),
            failed,
            output.fetches.len()
        );

        self.graph = graph;
        self.fetches = output.fetches;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &CategoryGraph {
        &self.graph
    }

    /// Sorted hosts of a category.
    pub fn hosts(&self, category: &str) -> Option<&[String]> {
        self.graph.hosts(category)
    }

    /// Metadata of the last fetch of a source URL.
    pub fn fetch_metadata(&self, url: &str) -> Option<&FetchMetadata> {
        self.fetches.get(url)
    }

    pub fn fetches(&self) -> impl Iterator<Item = (&str, &FetchMetadata)> {
        self.fetches.iter().map(|(url, meta)| (url.as_str(), meta))
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }

    fn raw_categories(&self, host: &str) -> Vec<String> {
        if let Some(store) = &self.store {
            let stored = store.categorise(host);
            if !stored.is_empty() {
                return stored;
            }
        }
        self.graph.categorise_host(host)
    }

    /// Categories of a URL or bare domain, refined.
    ///
    /// Returns [`Error::InvalidInput`] when no host can be extracted.
    pub fn categorise(&self, url: &str) -> Result<Vec<String>> {
        let host = extract_host(url).ok_or_else(|| Error::InvalidInput(url.to_string()))?;
        let raw = self.raw_categories(&host);
        Ok(self.refiner.refine(&host, url.trim(), raw))
    }

    /// Categories listing exactly this IP.
    pub fn categorise_ip(&self, ip: &str) -> Vec<String> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Vec::new();
        }
        if let Some(store) = &self.store {
            let stored = store.categorise_ip(ip);
            if !stored.is_empty() {
                return stored;
            }
        }
        self.graph.categorise_ip(ip)
    }

    /// Domain categories plus those of every address the domain resolves to.
    ///
    /// A failed lookup leaves the domain-only result.
    pub fn resolve_and_categorise(&self, domain: &str) -> Result<Vec<String>> {
        let host = extract_host(domain).ok_or_else(|| Error::InvalidInput(domain.to_string()))?;
        let mut raw = self.raw_categories(&host);

        match self.resolver.resolve(&host) {
            Ok(ips) => {
                for ip in ips {
                    for category in self.categorise_ip(&ip.to_string()) {
                        if !raw.contains(&category) {
                            raw.push(category);
                        }
                    }
                }
            }
            Err(e) => log::debug!("DNS lookup for {} failed: {}", host, e),
        }

        Ok(self.refiner.refine(&host, domain.trim(), raw))
    }

    fn processor(&self) -> Result<&DatasetProcessor> {
        self.datasets.as_ref().ok_or(Error::DatasetNotConfigured)
    }

    /// Load a CSV dataset and merge it into the graph.
    pub fn load_csv_dataset(
        &mut self,
        url: &str,
        options: &ProcessOptions,
        mappings: &ColumnMappings,
    ) -> Result<IntegrationResult> {
        let dataset = self.processor()?.process_csv_dataset(url, options)?;
        self.integrate(&dataset, mappings)
    }

    /// Load a Kaggle dataset and merge it into the graph.
    pub fn load_kaggle_dataset(
        &mut self,
        owner: &str,
        name: &str,
        options: &ProcessOptions,
        mappings: &ColumnMappings,
    ) -> Result<IntegrationResult> {
        let dataset = self.processor()?.process_kaggle_dataset(owner, name, options)?;
        self.integrate(&dataset, mappings)
    }

    /// Merge an already loaded dataset into the graph.
    ///
    /// The merge is a union, so repeating it is harmless. Content already
    /// ingested (same hash) is not recorded in the history a second time.
    pub fn integrate(&mut self, dataset: &Dataset, mappings: &ColumnMappings) -> Result<IntegrationResult> {
        let result = integrate_dataset_into_categorization(dataset, mappings)?;

        let added = self.graph.merge_dataset(&result.categories);
        if !self.merged.contains(&result.categories) {
            self.merged.push(result.categories.clone());
        }

        if self.history.record(result.metadata.clone()) {
            if let Some(store) = &self.store {
                store.record_dataset(&result.metadata);
            }
        } else {
            log::info!(
                "Dataset {} already ingested (hash {})",
                result.metadata.identifier,
                result.metadata.content_hash
            );
        }

        log::info!(
            "Merged {} new domains in {} categories from {}",
            added,
            result.categories.len(),
            result.metadata.identifier
        );
        Ok(result)
    }

    pub fn dataset_history(&self) -> &DatasetHistory {
        &self.history
    }
}

fn build_refiner(config: &Config) -> Refiner {
    if !config.smart_rules_enabled {
        return Refiner::new();
    }
    let patterns = match &config.pattern_source {
        Some(location) => PatternTable::load(location, config.timeout()),
        None => PatternTable::new(),
    };
    Refiner::new().with_rules(RuleEngine::new(&config.smart_rules), patterns)
}
