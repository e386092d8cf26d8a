//! Row-level heuristics: column detection, domain extraction and category
//! slugs. All pure functions.

use crate::host::{extract_host, normalise_host};

/// Key-name fragments that identify a URL column, in priority order.
pub const URL_KEYWORDS: &[&str] = &["url", "domain", "website", "site", "link", "address"];

/// Key-name fragments that identify a category column, in priority order.
pub const CATEGORY_KEYWORDS: &[&str] = &["category", "class", "type", "classification", "label"];

/// Slug used when a category value sanitizes to nothing.
pub const FALLBACK_CATEGORY: &str = "dataset_category";

/// Pick the key that best matches an ordered keyword list.
///
/// A key equal to a keyword (case-insensitively) wins first, in keyword
/// order. Otherwise keywords are tried in order and, for each, the first key
/// (in row order) containing it wins.
pub fn detect_column<'a, I>(keys: I, keywords: &[&str]) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let keys: Vec<(&str, String)> = keys.into_iter().map(|k| (k, k.to_lowercase())).collect();
    let find = |matches: fn(&str, &str) -> bool| {
        keywords.iter().find_map(|keyword| {
            keys.iter()
                .find(|(_, lower)| matches(lower.as_str(), keyword))
                .map(|(key, _)| *key)
        })
    };
    find(|lower, keyword| lower == keyword).or_else(|| find(|lower, keyword| lower.contains(keyword)))
}

pub fn detect_url_column<'a, I>(keys: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    detect_column(keys, URL_KEYWORDS)
}

pub fn detect_category_column<'a, I>(keys: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    detect_column(keys, CATEGORY_KEYWORDS)
}

/// Extract a normalised domain from a URL-ish value.
///
/// Values without a scheme are treated as `http://` URLs. When URL parsing
/// fails the scheme, path, query, fragment and port are stripped by hand.
pub fn extract_domain(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    extract_host(value).or_else(|| strip_manually(value))
}

fn strip_manually(value: &str) -> Option<String> {
    let rest = match value.find("://") {
        Some(pos) => &value[pos + 3..],
        None => value,
    };
    let rest = rest.rsplit('@').next().unwrap_or(rest);
    let end = rest
        .find(|c: char| matches!(c, '/' | '?' | '#' | ':'))
        .unwrap_or(rest.len());
    normalise_host(&rest[..end])
}

/// Turn a raw category label into a slug.
///
/// Lowercase, runs of non-alphanumerics become a single `_`, edges trimmed.
pub fn sanitize_category(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        FALLBACK_CATEGORY.to_string()
    } else {
        slug.to_string()
    }
}

/// Sanitize a dataset identifier for use in a file name.
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
