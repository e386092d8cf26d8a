//! Client configuration.
//!
//! Loaded from YAML (or JSON, which YAML accepts):
//!
//! ```yaml
//! categories:
//!   malware:
//!     - https://example.com/malware-hosts.txt
//!   phishing:
//!     - file:///etc/hostcat/phishing.txt
//!   threats: [malware, phishing]
//! cache_dir: /var/cache/hostcat
//! dns_servers: [1.1.1.1]
//! smart_rules:
//!   - name: github
//!     domains: [github.com]
//!     remove_categories: [malware]
//! ```

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rule::SmartRule;
use crate::Result;

/// Category definitions in definition order.
///
/// Each entry is either a source URL or the name of another category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    entries: Vec<(String, Vec<String>)>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, entries)` pairs, keeping their order.
    pub fn from_pairs<N, E>(pairs: Vec<(N, Vec<E>)>) -> Self
    where
        N: Into<String>,
        E: Into<String>,
    {
        let mut map = Self::new();
        for (name, entries) in pairs {
            map.insert(name, entries.into_iter().map(Into::into).collect());
        }
        map
    }

    /// Define a category. Redefining a name extends its entry list.
    pub fn insert(&mut self, name: impl Into<String>, entries: Vec<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.extend(entries),
            None => self.entries.push((name, entries)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for CategoryMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entries) in &self.entries {
            map.serialize_entry(name, entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CategoryMapVisitor;

        impl<'de> Visitor<'de> for CategoryMapVisitor {
            type Value = CategoryMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category name to a list of sources or category names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<CategoryMap, A::Error> {
                let mut map = CategoryMap::new();
                while let Some((name, entries)) = access.next_entry::<String, Vec<String>>()? {
                    map.insert(name, entries);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(CategoryMapVisitor)
    }
}

/// IAB taxonomy release used for code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyVersion {
    V2,
    #[default]
    V3,
}

impl TaxonomyVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyVersion::V2 => "v2",
            TaxonomyVersion::V3 => "v3",
        }
    }
}

/// IAB mapping toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IabConfig {
    pub enabled: bool,
    pub version: TaxonomyVersion,
}

/// Dataset integrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Where downloaded archives are extracted
    pub download_path: PathBuf,
    /// Where processed JSON row caches are written
    pub cache_path: PathBuf,
    pub timeout_secs: u64,
    pub kaggle_username: Option<String>,
    pub kaggle_key: Option<String>,
    /// Defaults to `~/.kaggle/kaggle.json`
    pub kaggle_credentials_path: Option<PathBuf>,
    pub use_kaggle: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("datasets"),
            cache_path: PathBuf::from("datasets/cache"),
            timeout_secs: 120,
            kaggle_username: None,
            kaggle_key: None,
            kaggle_credentials_path: None,
            use_kaggle: true,
        }
    }
}

impl DatasetConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration for a [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub categories: CategoryMap,
    pub cache_dir: Option<PathBuf>,
    pub force_refresh: bool,
    /// Name servers for `resolve_and_categorise`; empty uses the OS resolver
    pub dns_servers: Vec<IpAddr>,
    pub timeout_secs: u64,
    pub smart_rules_enabled: bool,
    /// Merged by name with the built-in rules
    pub smart_rules: Vec<SmartRule>,
    /// Local path, `file://` or `http(s)://` URL of the content pattern list
    pub pattern_source: Option<String>,
    pub iab: IabConfig,
    pub dataset: Option<DatasetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: CategoryMap::new(),
            cache_dir: None,
            force_refresh: false,
            dns_servers: Vec::new(),
            timeout_secs: 30,
            smart_rules_enabled: true,
            smart_rules: Vec::new(),
            pattern_source: None,
            iab: IabConfig::default(),
            dataset: None,
        }
    }
}

impl Config {
    /// Configuration with only category definitions set.
    pub fn with_categories(categories: CategoryMap) -> Self {
        Self {
            categories,
            ..Self::default()
        }
    }

    /// Parse YAML or JSON configuration text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order_preserved() {
        let yaml = r#"
categories:
  zeta: [https://example.com/z.txt]
  alpha: [file:///tmp/a.txt]
  both: [zeta, alpha]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let names: Vec<&str> = config.categories.names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "both"]);
        assert_eq!(config.categories.get("both").unwrap(), ["zeta", "alpha"]);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(config.categories.is_empty());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.smart_rules_enabled);
        assert!(!config.iab.enabled);
        assert_eq!(config.iab.version, TaxonomyVersion::V3);
        assert!(config.dataset.is_none());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
categories:
  malware: [https://example.com/m.txt]
cache_dir: /tmp/hostcat
force_refresh: true
dns_servers: [1.1.1.1, 8.8.8.8]
timeout_secs: 5
pattern_source: file:///etc/hostcat/patterns.txt
iab:
  enabled: true
  version: v2
smart_rules:
  - name: github
    domains: [github.com]
    remove_categories: [malware]
dataset:
  download_path: /tmp/ds
  kaggle_username: alice
  kaggle_key: secret
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/hostcat")));
        assert!(config.force_refresh);
        assert_eq!(config.dns_servers.len(), 2);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.iab.version, TaxonomyVersion::V2);
        assert_eq!(config.smart_rules[0].name, "github");

        let dataset = config.dataset.unwrap();
        assert_eq!(dataset.download_path, PathBuf::from("/tmp/ds"));
        assert_eq!(dataset.cache_path, PathBuf::from("datasets/cache"));
        assert_eq!(dataset.kaggle_username.as_deref(), Some("alice"));
        assert!(dataset.use_kaggle);
    }

    #[test]
    fn test_redefinition_extends() {
        let mut map = CategoryMap::new();
        map.insert("a", vec!["https://x/1".into()]);
        map.insert("a", vec!["b".into()]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a").unwrap(), ["https://x/1", "b"]);
    }

    #[test]
    fn test_category_map_serialize_roundtrip() {
        let map = CategoryMap::from_pairs(vec![("b", vec!["x"]), ("a", vec!["y"])]);
        let yaml = serde_yaml::to_string(&map).unwrap();
        let back: CategoryMap = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, map);
    }
}
