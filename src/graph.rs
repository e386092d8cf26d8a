//! Category graph: category name to deduplicated host set, with symbolic
//! references between categories and dataset provenance.
//!
//! # Matching
//!
//! A domain belongs to a category when it equals one of the category's
//! entries or is a subdomain of one (`x.bad.com` matches `bad.com`, but
//! `notbad.com` does not). IPv4 literals only match exactly.

use ahash::{AHashMap, AHashSet};
use std::collections::HashMap;

use crate::config::CategoryMap;
use crate::fetch::SourceFetcher;
use crate::host::{is_ipv4, suffixes};
use crate::metadata::FetchMetadata;
use crate::{Error, Result};

/// Hosts of a single category plus a lookup index.
#[derive(Debug, Clone, Default)]
struct Category {
    /// Sorted and deduplicated
    hosts: Vec<String>,
    index: AHashSet<String>,
    /// Hosts that only exist because a dataset added them
    dataset_hosts: AHashSet<String>,
    dataset_derived: bool,
}

impl Category {
    fn from_hosts(mut hosts: Vec<String>) -> Self {
        hosts.sort();
        hosts.dedup();
        let index = hosts.iter().cloned().collect();
        Self {
            hosts,
            index,
            ..Self::default()
        }
    }

    /// Union `hosts` into this category, returning the newly added ones.
    fn extend<'a>(&mut self, hosts: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        let mut added = Vec::new();
        for host in hosts {
            if self.index.insert(host.clone()) {
                added.push(host.clone());
            }
        }
        if !added.is_empty() {
            self.hosts.extend(added.iter().cloned());
            self.hosts.sort();
        }
        added
    }

    fn matches_domain(&self, domain: &str) -> bool {
        suffixes(domain).any(|candidate| self.index.contains(candidate))
    }
}

/// Size accounting split by origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Categories with at least one blocklist-origin host
    pub blocklist_categories: usize,
    /// Hosts that came from blocklists or category references
    pub blocklist_hosts: usize,
    /// Categories touched by a dataset merge
    pub dataset_categories: usize,
    /// Hosts that were added by dataset merges
    pub dataset_hosts: usize,
}

/// The resolved mapping from category name to hosts, in definition order.
///
/// The graph is a plain in-process value. Rebuilding it requires `&mut`
/// access, so a reload can never overlap a query on the same instance.
#[derive(Debug, Clone, Default)]
pub struct CategoryGraph {
    order: Vec<String>,
    categories: AHashMap<String, Category>,
}

impl CategoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a category with the given hosts.
    pub fn insert(&mut self, name: &str, hosts: Vec<String>) {
        if !self.categories.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.categories
            .insert(name.to_string(), Category::from_hosts(hosts));
    }

    /// Category names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Sorted hosts of a category.
    pub fn hosts(&self, name: &str) -> Option<&[String]> {
        self.categories.get(name).map(|c| c.hosts.as_slice())
    }

    pub fn contains_category(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total number of host entries across categories.
    pub fn host_count(&self) -> usize {
        self.categories.values().map(|c| c.hosts.len()).sum()
    }

    /// Categories of a normalised host, in definition order.
    ///
    /// IPv4 hosts are matched exactly; domains by suffix.
    pub fn categorise_host(&self, host: &str) -> Vec<String> {
        if is_ipv4(host) {
            return self.categorise_ip(host);
        }
        self.matching(|category| category.matches_domain(host))
    }

    /// Categories containing exactly this IP string.
    pub fn categorise_ip(&self, ip: &str) -> Vec<String> {
        let ip = ip.trim();
        self.matching(|category| category.index.contains(ip))
    }

    fn matching(&self, predicate: impl Fn(&Category) -> bool) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.categories.get(*name).is_some_and(&predicate))
            .cloned()
            .collect()
    }

    /// Union dataset-derived domains into the graph.
    ///
    /// Missing categories are created. Every touched category is marked as
    /// dataset-derived, and hosts it did not already hold are attributed to
    /// the dataset for [`CategoryGraph::stats`]. Returns the number of hosts
    /// that were not in their category before.
    pub fn merge_dataset<'a, I>(&mut self, categories: I) -> usize
    where
        I: IntoIterator<Item = (&'a String, &'a Vec<String>)>,
    {
        let mut total = 0;
        for (name, domains) in categories {
            if !self.categories.contains_key(name) {
                self.order.push(name.clone());
            }
            let category = self.categories.entry(name.clone()).or_default();
            let added = category.extend(domains.iter());
            total += added.len();
            category.dataset_hosts.extend(added);
            category.dataset_derived = true;
            log::debug!("Merged {} dataset domains into {}", domains.len(), name);
        }
        total
    }

    /// Whether a category was touched by a dataset merge.
    pub fn is_dataset_derived(&self, name: &str) -> bool {
        self.categories
            .get(name)
            .is_some_and(|c| c.dataset_derived)
    }

    /// Counts split between blocklist and dataset origin.
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for category in self.categories.values() {
            let from_dataset = category.dataset_hosts.len();
            let from_lists = category.hosts.len() - from_dataset;
            if from_lists > 0 {
                stats.blocklist_categories += 1;
            }
            if category.dataset_derived {
                stats.dataset_categories += 1;
            }
            stats.blocklist_hosts += from_lists;
            stats.dataset_hosts += from_dataset;
        }
        stats
    }
}

/// Output of a graph build: the graph and metadata for every source URL.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub graph: CategoryGraph,
    pub fetches: HashMap<String, FetchMetadata>,
}

/// Builds a [`CategoryGraph`] from a category definition map.
pub struct GraphBuilder<'a> {
    fetcher: &'a SourceFetcher,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(fetcher: &'a SourceFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch every source, then resolve category references.
    ///
    /// Source entries of all categories are resolved first. References are
    /// then expanded dependency-first, so `a: [b]` works whether `b` is
    /// defined before or after `a`. A reference cycle is an error; a
    /// reference to an unknown category is ignored with a warning.
    pub fn build(&self, definitions: &CategoryMap) -> Result<BuildOutput> {
        let mut raw: HashMap<&str, Vec<String>> = HashMap::new();
        let mut fetches = HashMap::new();

        for (name, entries) in definitions.iter() {
            let mut hosts = Vec::new();
            for url in entries.iter().filter(|e| is_source(e)) {
                let (fetched, meta) = self.fetcher.fetch(url);
                hosts.extend(fetched);
                fetches.insert(url.clone(), meta);
            }
            raw.entry(name).or_default().extend(hosts);
        }

        let order = resolution_order(definitions)?;
        let mut resolved: HashMap<&str, Vec<String>> = HashMap::new();
        for name in order {
            let mut hosts = raw.remove(name).unwrap_or_default();
            for reference in references(definitions, name) {
                match resolved.get(reference) {
                    Some(referenced) => hosts.extend(referenced.iter().cloned()),
                    None => log::warn!(
                        "Category {} references unknown category {}",
                        name,
                        reference
                    ),
                }
            }
            hosts.sort();
            hosts.dedup();
            resolved.insert(name, hosts);
        }

        let mut graph = CategoryGraph::new();
        for name in definitions.names() {
            let hosts = resolved.remove(name).unwrap_or_default();
            log::info!("Category {}: {} hosts", name, hosts.len());
            graph.insert(name, hosts);
        }

        Ok(BuildOutput { graph, fetches })
    }
}

/// A definition entry with a scheme is a source; anything else names a
/// category.
pub fn is_source(entry: &str) -> bool {
    entry.contains("://")
}

fn references<'d>(definitions: &'d CategoryMap, name: &str) -> impl Iterator<Item = &'d str> {
    definitions
        .get(name)
        .into_iter()
        .flatten()
        .map(|e| e.trim())
        .filter(|e| !is_source(e) && !e.is_empty())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order categories so that every category comes after those it
/// references, keeping definition order otherwise.
fn resolution_order(definitions: &CategoryMap) -> Result<Vec<&str>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(definitions.len());
    let mut path = Vec::new();

    for name in definitions.names() {
        visit(definitions, name, &mut marks, &mut order, &mut path)?;
    }
    Ok(order)
}

fn visit<'d>(
    definitions: &'d CategoryMap,
    name: &'d str,
    marks: &mut HashMap<&'d str, Mark>,
    order: &mut Vec<&'d str>,
    path: &mut Vec<&'d str>,
) -> Result<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(Error::CategoryCycle(cycle));
        }
        None => {}
    }

    marks.insert(name, Mark::Visiting);
    path.push(name);
    for reference in references(definitions, name) {
        if definitions.get(reference).is_some() {
            visit(definitions, reference, marks, order, path)?;
        }
    }
    path.pop();
    marks.insert(name, Mark::Done);
    order.push(name);
    Ok(())
}
