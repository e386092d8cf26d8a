//! Dataset acquisition: CSV download, Kaggle archives and the processed
//! row cache.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use super::columns::sanitize_identifier;
use super::{Dataset, DatasetRecord, DatasetRows, DatasetSource};
use crate::config::DatasetConfig;
use crate::{Error, Result};

const KAGGLE_API: &str = "https://www.kaggle.com/api/v1/datasets/download";

/// Per-call processing switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Serve previously processed rows from the JSON cache
    pub use_cache: bool,
    /// Ignore the cache and any extracted files; always download
    pub force_download: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_download: false,
        }
    }
}

/// Kaggle API credentials, in the shape of `kaggle.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

/// Find Kaggle credentials.
///
/// Explicit config values win, then the credentials file, then the
/// `KAGGLE_USERNAME`/`KAGGLE_KEY` variables looked up through `env`.
pub fn resolve_credentials<F>(config: &DatasetConfig, env: F) -> Option<KaggleCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    if let (Some(username), Some(key)) = (&config.kaggle_username, &config.kaggle_key) {
        return Some(KaggleCredentials {
            username: username.clone(),
            key: key.clone(),
        });
    }

    let path = config
        .kaggle_credentials_path
        .clone()
        .or_else(|| dirs::home_dir().map(|home| home.join(".kaggle").join("kaggle.json")));
    if let Some(path) = path.filter(|p| p.is_file()) {
        match fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|s| serde_json::from_str::<KaggleCredentials>(&s).map_err(Error::from))
        {
            Ok(credentials) => return Some(credentials),
            Err(e) => log::warn!("Ignoring Kaggle credentials file {:?}: {}", path, e),
        }
    }

    match (env("KAGGLE_USERNAME"), env("KAGGLE_KEY")) {
        (Some(username), Some(key)) => Some(KaggleCredentials { username, key }),
        _ => None,
    }
}

/// Parse CSV with a header row into records keyed by header name.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<DatasetRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| Error::DatasetParse(e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::DatasetParse(e.to_string()))?;
        let row: DatasetRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Extract the CSV members of a ZIP archive into `dir`, flattening paths.
pub(crate) fn extract_csv_members(archive: &[u8], dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(archive)).map_err(|e| Error::DatasetParse(e.to_string()))?;
    fs::create_dir_all(dir)?;

    let mut paths = Vec::new();
    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|e| Error::DatasetParse(e.to_string()))?;
        if member.is_dir() {
            continue;
        }
        let Some(name) = Path::new(member.name()).file_name().map(|n| n.to_os_string()) else {
            continue;
        };
        let target = dir.join(name);
        if !is_csv(&target) {
            continue;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut member, &mut out)?;
        paths.push(target);
    }

    if paths.is_empty() {
        return Err(Error::DatasetParse("archive contains no CSV files".to_string()));
    }
    paths.sort();
    Ok(paths)
}

fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_csv(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn rows_from_files(paths: &[PathBuf]) -> Result<DatasetRows> {
    if let [single] = paths {
        return Ok(DatasetRows::Single(parse_csv(fs::File::open(single)?)?));
    }
    let mut files = BTreeMap::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.insert(name, parse_csv(fs::File::open(path)?)?);
    }
    Ok(DatasetRows::Multi(files))
}

/// Loads dataset rows from CSV URLs and Kaggle, caching processed rows.
pub struct DatasetProcessor {
    config: DatasetConfig,
    client: reqwest::blocking::Client,
}

impl DatasetProcessor {
    pub fn new(config: DatasetConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Path of the processed-row cache for a source.
    pub fn cache_file(&self, source: &DatasetSource) -> PathBuf {
        self.config.cache_path.join(format!(
            "{}_{}_processed.json",
            source.source_type(),
            sanitize_identifier(&source.identifier())
        ))
    }

    /// Directory Kaggle archives for `owner/name` are extracted into.
    pub fn extract_dir(&self, owner: &str, name: &str) -> PathBuf {
        self.config.download_path.join(format!(
            "{}_{}",
            sanitize_identifier(owner),
            sanitize_identifier(name)
        ))
    }

    fn read_cache(&self, source: &DatasetSource) -> Option<DatasetRows> {
        let path = self.cache_file(source);
        let data = fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(rows) => {
                log::debug!("Dataset cache hit: {:?}", path);
                Some(rows)
            }
            Err(e) => {
                log::warn!("Ignoring corrupt dataset cache {:?}: {}", path, e);
                None
            }
        }
    }

    fn write_cache(&self, source: &DatasetSource, rows: &DatasetRows) -> Result<()> {
        let path = self.cache_file(source);
        fs::create_dir_all(&self.config.cache_path)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(rows)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn cached(&self, source: &DatasetSource, options: &ProcessOptions) -> Option<Dataset> {
        if !options.use_cache || options.force_download {
            return None;
        }
        self.read_cache(source).map(|rows| Dataset {
            source: source.clone(),
            rows,
        })
    }

    fn store(&self, source: DatasetSource, rows: DatasetRows) -> Dataset {
        if let Err(e) = self.write_cache(&source, &rows) {
            log::warn!("Failed to write dataset cache for {}: {}", source.identifier(), e);
        }
        Dataset { source, rows }
    }

    fn read_csv_source(&self, location: &str) -> Result<Vec<u8>> {
        if !location.contains("://") {
            return Ok(fs::read(location)?);
        }
        let url = url::Url::parse(location)
            .map_err(|e| Error::DatasetConfig(format!("invalid dataset location {}: {}", location, e)))?;
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| Error::DatasetConfig(format!("not a local path: {}", location)))?;
                Ok(fs::read(path)?)
            }
            "http" | "https" => {
                log::info!("Downloading dataset {}", location);
                let response = self.client.get(url).send()?.error_for_status()?;
                Ok(response.bytes()?.to_vec())
            }
            scheme => Err(Error::DatasetConfig(format!(
                "unsupported dataset scheme {:?} in {}",
                scheme, location
            ))),
        }
    }

    /// Load rows of a CSV file from a URL, `file://` URL or local path.
    pub fn process_csv_dataset(&self, url: &str, options: &ProcessOptions) -> Result<Dataset> {
        let source = DatasetSource::Csv {
            url: url.to_string(),
        };
        if let Some(dataset) = self.cached(&source, options) {
            return Ok(dataset);
        }

        let content = self.read_csv_source(url)?;
        let rows = DatasetRows::Single(parse_csv(content.as_slice())?);
        log::info!("Loaded {} rows from {}", rows.len(), url);
        Ok(self.store(source, rows))
    }

    /// Load the CSV files of a Kaggle dataset.
    ///
    /// Previously extracted files are reused without contacting Kaggle unless
    /// `force_download` is set.
    pub fn process_kaggle_dataset(
        &self,
        owner: &str,
        name: &str,
        options: &ProcessOptions,
    ) -> Result<Dataset> {
        if !self.config.use_kaggle {
            return Err(Error::DatasetConfig("Kaggle access is disabled".to_string()));
        }
        let source = DatasetSource::Kaggle {
            owner: owner.to_string(),
            name: name.to_string(),
        };
        if let Some(dataset) = self.cached(&source, options) {
            return Ok(dataset);
        }

        let dir = self.extract_dir(owner, name);
        let mut files = if options.force_download {
            Vec::new()
        } else {
            csv_files_in(&dir)?
        };

        if files.is_empty() {
            let credentials = resolve_credentials(&self.config, |k| std::env::var(k).ok())
                .ok_or_else(|| {
                    Error::DatasetConfig(
                        "Kaggle credentials not found (config, kaggle.json or KAGGLE_USERNAME/KAGGLE_KEY)"
                            .to_string(),
                    )
                })?;
            let archive = self.download_kaggle(owner, name, &credentials)?;
            files = extract_csv_members(&archive, &dir)?;
        } else {
            log::debug!("Reusing {} extracted files in {:?}", files.len(), dir);
        }

        let rows = rows_from_files(&files)?;
        log::info!("Loaded {} rows from {}/{}", rows.len(), owner, name);
        Ok(self.store(source, rows))
    }

    fn download_kaggle(&self, owner: &str, name: &str, credentials: &KaggleCredentials) -> Result<Vec<u8>> {
        let url = format!("{}/{}/{}", KAGGLE_API, owner, name);
        log::info!("Downloading Kaggle dataset {}/{}", owner, name);
        let response = self
            .client
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.key))
            .send()?
            .error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn processor(dir: &TempDir) -> DatasetProcessor {
        DatasetProcessor::new(DatasetConfig {
            download_path: dir.path().join("downloads"),
            cache_path: dir.path().join("cache"),
            kaggle_credentials_path: Some(dir.path().join("missing.json")),
            ..DatasetConfig::default()
        })
        .unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_csv() {
        let rows = parse_csv("url,category\nhttps://a.com,\"ads, tracking\"\nb.com,malware\n".as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["category"], "ads, tracking");
        assert_eq!(rows[1]["url"], "b.com");
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, ["url", "category"]);
    }

    #[test]
    fn test_parse_csv_ragged_rows() {
        let err = parse_csv("a,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::DatasetParse(_)));
    }

    #[test]
    fn test_parse_csv_empty() {
        assert!(parse_csv("".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_credentials_priority() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("kaggle.json");
        fs::write(&file, r#"{"username":"file-user","key":"file-key"}"#).unwrap();
        let env = |k: &str| match k {
            "KAGGLE_USERNAME" => Some("env-user".to_string()),
            "KAGGLE_KEY" => Some("env-key".to_string()),
            _ => None,
        };

        let mut config = DatasetConfig {
            kaggle_username: Some("cfg-user".into()),
            kaggle_key: Some("cfg-key".into()),
            kaggle_credentials_path: Some(file.clone()),
            ..DatasetConfig::default()
        };
        assert_eq!(resolve_credentials(&config, env).unwrap().username, "cfg-user");

        config.kaggle_key = None;
        assert_eq!(resolve_credentials(&config, env).unwrap().username, "file-user");

        config.kaggle_credentials_path = Some(dir.path().join("missing.json"));
        assert_eq!(resolve_credentials(&config, env).unwrap().username, "env-user");
        assert!(resolve_credentials(&config, no_env).is_none());
    }

    #[test]
    fn test_corrupt_credentials_file_falls_through() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("kaggle.json");
        fs::write(&file, "not json").unwrap();
        let config = DatasetConfig {
            kaggle_credentials_path: Some(file),
            ..DatasetConfig::default()
        };
        assert!(resolve_credentials(&config, no_env).is_none());
    }

    #[test]
    fn test_csv_dataset_local_and_cache() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("data.csv");
        fs::write(&csv_path, "url,category\nhttps://m.example.com,malware\n").unwrap();
        let location = csv_path.to_string_lossy().into_owned();
        let p = processor(&dir);

        let first = p.process_csv_dataset(&location, &ProcessOptions::default()).unwrap();
        assert_eq!(first.rows.len(), 1);
        assert!(p.cache_file(&first.source).exists());

        // Cached rows win over the changed file
        fs::write(&csv_path, "url,category\na.com,x\nb.com,y\n").unwrap();
        let cached = p.process_csv_dataset(&location, &ProcessOptions::default()).unwrap();
        assert_eq!(cached, first);

        let fresh = p
            .process_csv_dataset(&location, &ProcessOptions { use_cache: false, force_download: false })
            .unwrap();
        assert_eq!(fresh.rows.len(), 2);
    }

    #[test]
    fn test_csv_dataset_file_url() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("data.csv");
        fs::write(&csv_path, "domain\nexample.com\n").unwrap();
        let url = url::Url::from_file_path(&csv_path).unwrap().to_string();

        let dataset = processor(&dir).process_csv_dataset(&url, &ProcessOptions::default()).unwrap();
        assert_eq!(dataset.source.identifier(), url);
        assert_eq!(dataset.rows.len(), 1);
    }

    #[test]
    fn test_corrupt_cache_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("data.csv");
        fs::write(&csv_path, "url\na.com\n").unwrap();
        let location = csv_path.to_string_lossy().into_owned();
        let p = processor(&dir);

        let source = DatasetSource::Csv { url: location.clone() };
        fs::create_dir_all(dir.path().join("cache")).unwrap();
        fs::write(p.cache_file(&source), "{broken").unwrap();

        let dataset = p.process_csv_dataset(&location, &ProcessOptions::default()).unwrap();
        assert_eq!(dataset.rows.len(), 1);
    }

    #[test]
    fn test_missing_csv_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.csv").to_string_lossy().into_owned();
        assert!(matches!(
            processor(&dir).process_csv_dataset(&missing, &ProcessOptions::default()),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_unsupported_location_is_config_error() {
        let dir = TempDir::new().unwrap();
        let p = processor(&dir);
        let options = ProcessOptions {
            use_cache: false,
            ..ProcessOptions::default()
        };
        for location in ["ftp://example.com/sites.csv", "file://remote-host/sites.csv", "http://"] {
            match p.process_csv_dataset(location, &options) {
                Err(Error::DatasetConfig(message)) => assert!(message.contains(location)),
                other => panic!("{}: unexpected {:?}", location, other.map(|d| d.rows.len())),
            }
        }
    }

    #[test]
    fn test_cache_file_name() {
        let dir = TempDir::new().unwrap();
        let p = processor(&dir);
        let source = DatasetSource::Kaggle {
            owner: "some-one".into(),
            name: "web.lists".into(),
        };
        assert_eq!(
            p.cache_file(&source),
            dir.path().join("cache").join("kaggle_some_one_web_lists_processed.json")
        );
    }

    #[test]
    fn test_extract_csv_members() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        writer.start_file("nested/sites.csv", options).unwrap();
        writer.write_all(b"url,category\na.com,ads\n").unwrap();
        writer.start_file("README.md", options).unwrap();
        writer.write_all(b"ignored").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let dir = TempDir::new().unwrap();
        let paths = extract_csv_members(&bytes, dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("sites.csv")]);
        assert!(!dir.path().join("README.md").exists());
    }

    #[test]
    fn test_extract_without_csv_fails() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("notes.txt", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(b"x").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let dir = TempDir::new().unwrap();
        assert!(matches!(
            extract_csv_members(&bytes, dir.path()),
            Err(Error::DatasetParse(_))
        ));
    }

    #[test]
    fn test_kaggle_reuses_extracted_files() {
        let dir = TempDir::new().unwrap();
        let p = processor(&dir);
        let extract = p.extract_dir("owner", "lists");
        fs::create_dir_all(&extract).unwrap();
        fs::write(extract.join("a.csv"), "url,type\na.com,ads\n").unwrap();
        fs::write(extract.join("b.csv"), "url,type\nb.com,ads\nc.com,spam\n").unwrap();

        let dataset = p
            .process_kaggle_dataset("owner", "lists", &ProcessOptions::default())
            .unwrap();
        match &dataset.rows {
            DatasetRows::Multi(files) => {
                assert_eq!(files.len(), 2);
                assert_eq!(files["b.csv"].len(), 2);
            }
            other => panic!("expected multiple files, got {:?}", other),
        }
        assert_eq!(dataset.source.identifier(), "owner/lists");
    }

    #[test]
    fn test_kaggle_disabled() {
        let dir = TempDir::new().unwrap();
        let p = DatasetProcessor::new(DatasetConfig {
            use_kaggle: false,
            cache_path: dir.path().join("cache"),
            ..DatasetConfig::default()
        })
        .unwrap();
        assert!(matches!(
            p.process_kaggle_dataset("a", "b", &ProcessOptions::default()),
            Err(Error::DatasetConfig(_))
        ));
    }

    #[test]
    fn test_kaggle_without_credentials() {
        if std::env::var("KAGGLE_USERNAME").is_ok() {
            return;
        }
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            processor(&dir).process_kaggle_dataset("a", "b", &ProcessOptions::default()),
            Err(Error::DatasetConfig(_))
        ));
    }
}
