//! Dataset integrator: tabular third-party datasets turned into extra
//! category/host entries with provenance.
//!
//! Rows come from a CSV URL or a Kaggle archive (see [`DatasetProcessor`]),
//! then [`integrate_dataset_into_categorization`] finds the URL and category
//! columns, extracts domains and maps categories to slugs. The result is
//! merged into a [`crate::CategoryGraph`] by the client.

mod columns;
mod source;

pub use columns::{
    detect_category_column, detect_column, detect_url_column, extract_domain, sanitize_category,
    sanitize_identifier, CATEGORY_KEYWORDS, FALLBACK_CATEGORY, URL_KEYWORDS,
};
pub use source::{parse_csv, resolve_credentials, DatasetProcessor, KaggleCredentials, ProcessOptions};

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::SystemTime;

use crate::metadata::{now, system_time_serde};
use crate::Result;

/// One parsed row, columns in file order.
pub type DatasetRecord = serde_json::Map<String, Value>;

/// Rows of a dataset: one file, or several keyed by file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetRows {
    Single(Vec<DatasetRecord>),
    Multi(BTreeMap<String, Vec<DatasetRecord>>),
}

impl DatasetRows {
    /// Every row across all files.
    pub fn records(&self) -> Box<dyn Iterator<Item = &DatasetRecord> + '_> {
        match self {
            DatasetRows::Single(rows) => Box::new(rows.iter()),
            DatasetRows::Multi(files) => Box::new(files.values().flatten()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DatasetRows::Single(rows) => rows.len(),
            DatasetRows::Multi(files) => files.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kind of dataset origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Csv,
    Kaggle,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Csv => "csv",
            SourceType::Kaggle => "kaggle",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a dataset came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Csv { url: String },
    Kaggle { owner: String, name: String },
}

impl DatasetSource {
    pub fn source_type(&self) -> SourceType {
        match self {
            DatasetSource::Csv { .. } => SourceType::Csv,
            DatasetSource::Kaggle { .. } => SourceType::Kaggle,
        }
    }

    /// URL for CSV datasets, `owner/name` for Kaggle.
    pub fn identifier(&self) -> String {
        match self {
            DatasetSource::Csv { url } => url.clone(),
            DatasetSource::Kaggle { owner, name } => format!("{}/{}", owner, name),
        }
    }
}

/// A loaded dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub source: DatasetSource,
    pub rows: DatasetRows,
}

/// Explicit column choices and category overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMappings {
    pub url_column: Option<String>,
    pub category_column: Option<String>,
    /// Raw category value to category name, bypassing sanitizing
    pub category_map: HashMap<String, String>,
}

/// Record of one ingested dataset, unique per content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub content_hash: String,
    pub source_type: SourceType,
    pub identifier: String,
    pub total_entries: usize,
    #[serde(with = "system_time_serde")]
    pub processed_at: Option<SystemTime>,
}

/// Output of [`integrate_dataset_into_categorization`].
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationResult {
    /// Category to deduplicated domains, in row order
    pub categories: BTreeMap<String, Vec<String>>,
    pub metadata: DatasetMetadata,
}

impl IntegrationResult {
    pub fn domain_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// SHA-256 over the canonical JSON form of the rows.
pub fn content_hash(rows: &DatasetRows) -> Result<String> {
    let bytes = serde_json::to_vec(rows)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn resolve_category(raw: &str, mappings: &ColumnMappings) -> String {
    let raw = raw.trim();
    match mappings.category_map.get(raw) {
        Some(mapped) => mapped.clone(),
        None => sanitize_category(raw),
    }
}

/// Turn dataset rows into category → domain lists plus dataset metadata.
///
/// Columns come from `mappings` when given, otherwise they are detected per
/// row. Rows without a usable domain are skipped; rows without a category
/// value land in [`FALLBACK_CATEGORY`].
pub fn integrate_dataset_into_categorization(
    dataset: &Dataset,
    mappings: &ColumnMappings,
) -> Result<IntegrationResult> {
    let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen: AHashSet<(String, String)> = AHashSet::new();
    let mut skipped = 0usize;

    for record in dataset.rows.records() {
        let keys = || record.keys().map(String::as_str);

        let category_column = mappings
            .category_column
            .as_deref()
            .or_else(|| detect_category_column(keys()));
        // The category column is never also the URL column
        let url_column = mappings
            .url_column
            .as_deref()
            .or_else(|| detect_url_column(keys().filter(|k| Some(*k) != category_column)));
        let Some(domain) = url_column
            .and_then(|c| record.get(c))
            .map(value_text)
            .and_then(|v| extract_domain(&v))
        else {
            skipped += 1;
            continue;
        };

        let raw_category = category_column
            .and_then(|c| record.get(c))
            .map(value_text)
            .unwrap_or_default();
        let category = resolve_category(&raw_category, mappings);

        if seen.insert((category.clone(), domain.clone())) {
            categories.entry(category).or_default().push(domain);
        }
    }

    if skipped > 0 {
        log::debug!(
            "Skipped {} rows without a usable domain in {}",
            skipped,
            dataset.source.identifier()
        );
    }

    let metadata = DatasetMetadata {
        content_hash: content_hash(&dataset.rows)?,
        source_type: dataset.source.source_type(),
        identifier: dataset.source.identifier(),
        total_entries: dataset.rows.len(),
        processed_at: Some(now()),
    };

    Ok(IntegrationResult {
        categories,
        metadata,
    })
}

/// Accumulated dataset metadata, one record per content hash.
#[derive(Debug, Clone, Default)]
pub struct DatasetHistory {
    records: Vec<DatasetMetadata>,
}

impl DatasetHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record metadata. Returns `false` if the content was seen before.
    pub fn record(&mut self, metadata: DatasetMetadata) -> bool {
        if self.find(&metadata.content_hash).is_some() {
            return false;
        }
        self.records.push(metadata);
        true
    }

    pub fn find(&self, content_hash: &str) -> Option<&DatasetMetadata> {
        self.records.iter().find(|m| m.content_hash == content_hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetMetadata> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> DatasetRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn csv_dataset(rows: Vec<DatasetRecord>) -> Dataset {
        Dataset {
            source: DatasetSource::Csv {
                url: "https://example.com/data.csv".to_string(),
            },
            rows: DatasetRows::Single(rows),
        }
    }

    #[test]
    fn test_integrate_detected_columns() {
        let dataset = csv_dataset(vec![
            record(&[("url", "https://m.example.com"), ("category", "malware")]),
            record(&[("url", "https://p.example.com"), ("category", "phishing")]),
        ]);

        let result = integrate_dataset_into_categorization(&dataset, &ColumnMappings::default()).unwrap();
        assert_eq!(result.categories["malware"], vec!["m.example.com"]);
        assert_eq!(result.categories["phishing"], vec!["p.example.com"]);
        assert_eq!(result.metadata.total_entries, 2);
        assert_eq!(result.metadata.source_type, SourceType::Csv);
        assert_eq!(result.metadata.identifier, "https://example.com/data.csv");
        assert_eq!(result.metadata.content_hash.len(), 64);
    }

    #[test]
    fn test_category_column_not_used_for_urls() {
        let dataset = csv_dataset(vec![
            record(&[("website_category", "news"), ("link", "https://n.example.com/a")]),
            record(&[("website_category", "shopping"), ("host", "shop.example.com")]),
        ]);

        let result = integrate_dataset_into_categorization(&dataset, &ColumnMappings::default()).unwrap();
        assert_eq!(result.categories["news"], vec!["n.example.com"]);
        // No URL-like key remains once the category column is set aside
        assert_eq!(result.categories.len(), 1);
    }

    #[test]
    fn test_integrate_explicit_mappings() {
        let dataset = csv_dataset(vec![
            record(&[("host", "www.bad.com"), ("verdict", "Known Bad"), ("site", "ignored.com")]),
            record(&[("host", "worse.com"), ("verdict", "spam"), ("site", "ignored.com")]),
        ]);
        let mut mappings = ColumnMappings {
            url_column: Some("host".to_string()),
            category_column: Some("verdict".to_string()),
            ..ColumnMappings::default()
        };
        mappings
            .category_map
            .insert("spam".to_string(), "junk_mail".to_string());

        let result = integrate_dataset_into_categorization(&dataset, &mappings).unwrap();
        assert_eq!(result.categories["known_bad"], vec!["bad.com"]);
        assert_eq!(result.categories["junk_mail"], vec!["worse.com"]);
        assert_eq!(result.categories.len(), 2);
    }

    #[test]
    fn test_integrate_skips_and_dedups() {
        let dataset = csv_dataset(vec![
            record(&[("url", ""), ("category", "malware")]),
            record(&[("url", "bad.com"), ("category", "malware")]),
            record(&[("url", "https://www.bad.com/x"), ("category", "Malware")]),
            record(&[("url", "nocat.com")]),
            record(&[("name", "no url column")]),
        ]);

        let result = integrate_dataset_into_categorization(&dataset, &ColumnMappings::default()).unwrap();
        assert_eq!(result.categories["malware"], vec!["bad.com"]);
        assert_eq!(result.categories[FALLBACK_CATEGORY], vec!["nocat.com"]);
        assert_eq!(result.metadata.total_entries, 5);
    }

    #[test]
    fn test_integrate_multi_file() {
        let mut files = BTreeMap::new();
        files.insert(
            "a.csv".to_string(),
            vec![record(&[("domain", "a.com"), ("type", "ads")])],
        );
        files.insert(
            "b.csv".to_string(),
            vec![record(&[("website", "b.com"), ("label", "ads")])],
        );
        let dataset = Dataset {
            source: DatasetSource::Kaggle {
                owner: "someone".to_string(),
                name: "lists".to_string(),
            },
            rows: DatasetRows::Multi(files),
        };

        let result = integrate_dataset_into_categorization(&dataset, &ColumnMappings::default()).unwrap();
        assert_eq!(result.categories["ads"], vec!["a.com", "b.com"]);
        assert_eq!(result.metadata.identifier, "someone/lists");
        assert_eq!(result.metadata.source_type, SourceType::Kaggle);
    }

    #[test]
    fn test_content_hash_identity() {
        let rows = DatasetRows::Single(vec![record(&[("url", "a.com")])]);
        let same = DatasetRows::Single(vec![record(&[("url", "a.com")])]);
        let other = DatasetRows::Single(vec![record(&[("url", "b.com")])]);
        assert_eq!(content_hash(&rows).unwrap(), content_hash(&same).unwrap());
        assert_ne!(content_hash(&rows).unwrap(), content_hash(&other).unwrap());
    }

    #[test]
    fn test_history_dedup() {
        let dataset = csv_dataset(vec![record(&[("url", "a.com"), ("category", "x")])]);
        let first = integrate_dataset_into_categorization(&dataset, &ColumnMappings::default()).unwrap();
        let second = integrate_dataset_into_categorization(&dataset, &ColumnMappings::default()).unwrap();

        let mut history = DatasetHistory::new();
        assert!(history.record(first.metadata.clone()));
        assert!(!history.record(second.metadata));
        assert_eq!(history.len(), 1);
        assert!(history.find(&first.metadata.content_hash).is_some());
    }

    #[test]
    fn test_rows_json_shapes() {
        let single = DatasetRows::Single(vec![record(&[("url", "a.com")])]);
        let json = serde_json::to_string(&single).unwrap();
        assert!(json.starts_with('['));
        assert_eq!(serde_json::from_str::<DatasetRows>(&json).unwrap(), single);

        let mut files = BTreeMap::new();
        files.insert("f.csv".to_string(), vec![record(&[("url", "a.com")])]);
        let multi = DatasetRows::Multi(files);
        let json = serde_json::to_string(&multi).unwrap();
        assert!(json.starts_with('{'));
        assert_eq!(serde_json::from_str::<DatasetRows>(&json).unwrap(), multi);
    }
}
