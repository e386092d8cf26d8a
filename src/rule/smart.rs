//! Domain-triggered smart rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::host::{matches_domain, normalise_host};

/// Adds categories when the full URL matches a regex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PathRule {
    pub pattern: String,
    pub categories: Vec<String>,
}

impl PathRule {
    pub fn new(pattern: &str, categories: &[&str]) -> Self {
        Self {
            pattern: pattern.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A named transformation applied to the categories of matching domains.
///
/// Transformations run in field order: removal, primary whitelist, path
/// additions, final whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SmartRule {
    pub name: String,
    /// Trigger domains, matched exactly or by suffix
    pub domains: Vec<String>,
    pub remove_categories: Vec<String>,
    /// Replace the list with its intersection with these, unless that is empty
    pub keep_primary_only: Option<Vec<String>>,
    pub add_categories_by_path: Vec<PathRule>,
    /// Final intersection, applied even when the result is empty
    pub allowed_categories_only: Option<Vec<String>>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Built-in rule table.
static DEFAULT_RULES: Lazy<Vec<SmartRule>> = Lazy::new(|| {
    vec![
        SmartRule {
            name: "youtube".to_string(),
            domains: strings(&["youtube.com", "youtu.be", "googlevideo.com", "ytimg.com"]),
            remove_categories: strings(&["adult", "porn", "malware"]),
            keep_primary_only: Some(strings(&["video", "streaming", "youtube"])),
            add_categories_by_path: vec![
                PathRule::new(r"/shorts/", &["short_video"]),
                PathRule::new(r"/live(/|$|\?)", &["live_streaming"]),
            ],
            allowed_categories_only: None,
        },
        SmartRule {
            name: "github".to_string(),
            domains: strings(&["github.com", "githubusercontent.com", "github.io"]),
            remove_categories: strings(&["malware", "phishing"]),
            ..SmartRule::default()
        },
        SmartRule {
            name: "wikipedia".to_string(),
            domains: strings(&["wikipedia.org", "wikimedia.org"]),
            allowed_categories_only: Some(strings(&["education", "reference"])),
            ..SmartRule::default()
        },
        SmartRule {
            name: "google_drive".to_string(),
            domains: strings(&["drive.google.com", "docs.google.com"]),
            remove_categories: strings(&["ads", "tracking"]),
            add_categories_by_path: vec![PathRule::new(r"/file/d/", &["file_sharing"])],
            ..SmartRule::default()
        },
    ]
});

/// The built-in rules, in table order.
pub fn default_rules() -> Vec<SmartRule> {
    DEFAULT_RULES.clone()
}

/// Merge user rules over a base table by name.
///
/// A user rule replaces the base rule of the same name in place; unmatched
/// user rules are appended in their own order.
pub fn merge_rules(base: Vec<SmartRule>, user: &[SmartRule]) -> Vec<SmartRule> {
    let mut merged = base;
    for rule in user {
        match merged.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule.clone(),
            None => merged.push(rule.clone()),
        }
    }
    merged
}

struct CompiledRule {
    rule: SmartRule,
    triggers: Vec<String>,
    paths: Vec<(Regex, Vec<String>)>,
}

impl CompiledRule {
    fn compile(rule: SmartRule) -> Self {
        let triggers = rule
            .domains
            .iter()
            .filter_map(|d| normalise_host(d))
            .collect();
        let paths = rule
            .add_categories_by_path
            .iter()
            .filter_map(|p| match Regex::new(&p.pattern) {
                Ok(re) => Some((re, p.categories.clone())),
                Err(e) => {
                    log::warn!(
                        "Skipping path pattern {:?} in rule {}: {}",
                        p.pattern,
                        rule.name,
                        e
                    );
                    None
                }
            })
            .collect();
        Self {
            rule,
            triggers,
            paths,
        }
    }

    fn triggers_on(&self, host: &str) -> bool {
        self.triggers.iter().any(|t| matches_domain(host, t))
    }

    fn apply(&self, url: &str, categories: &mut Vec<String>) {
        let rule = &self.rule;

        if !rule.remove_categories.is_empty() {
            categories.retain(|c| !rule.remove_categories.contains(c));
        }

        if let Some(primary) = &rule.keep_primary_only {
            let kept: Vec<String> = categories
                .iter()
                .filter(|c| primary.contains(c))
                .cloned()
                .collect();
            if !kept.is_empty() {
                *categories = kept;
            }
        }

        for (pattern, extra) in &self.paths {
            if pattern.is_match(url) {
                for category in extra {
                    if !categories.contains(category) {
                        categories.push(category.clone());
                    }
                }
            }
        }

        if let Some(allowed) = &rule.allowed_categories_only {
            categories.retain(|c| allowed.contains(c));
        }
    }
}

/// Immutable, merged smart rule table.
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Built-in rules merged with `user` rules by name.
    pub fn new(user: &[SmartRule]) -> Self {
        Self::from_rules(merge_rules(default_rules(), user))
    }

    /// Exactly the given rules, without the built-in table.
    pub fn from_rules(rules: Vec<SmartRule>) -> Self {
        Self {
            rules: rules.into_iter().map(CompiledRule::compile).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule names in application order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.rule.name.as_str())
    }

    /// Apply every rule triggered by `host`, cumulatively, in table order.
    pub fn apply(&self, host: &str, url: &str, mut categories: Vec<String>) -> Vec<String> {
        for compiled in self.rules.iter().filter(|r| r.triggers_on(host)) {
            log::debug!("Smart rule {} applies to {}", compiled.rule.name, host);
            compiled.apply(url, &mut categories);
        }
        categories
    }
}
