//! Rule refinement of raw categorisation results.
//!
//! Steps run in a fixed order for each query:
//! 1. Smart rules triggered by the host
//! 2. Regex content classification for video-like categories
//! 3. Taxonomy code mapping

mod pattern;
mod smart;
mod taxonomy;

pub use pattern::{PatternTable, CONTENT_SUFFIX, VIDEO_CATEGORIES};
pub use smart::{default_rules, merge_rules, PathRule, RuleEngine, SmartRule};
pub use taxonomy::{map_categories, StaticTaxonomy, TaxonomyMapper, UNKNOWN_CODE};

use crate::config::TaxonomyVersion;

/// The assembled refinement pipeline.
#[derive(Default)]
pub struct Refiner {
    rules: Option<RuleEngine>,
    patterns: PatternTable,
    taxonomy: Option<(Box<dyn TaxonomyMapper>, TaxonomyVersion)>,
}

impl Refiner {
    /// A pipeline that returns its input unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable smart rules and content classification.
    pub fn with_rules(mut self, rules: RuleEngine, patterns: PatternTable) -> Self {
        self.rules = Some(rules);
        self.patterns = patterns;
        self
    }

    /// Enable taxonomy mapping.
    pub fn with_taxonomy(mut self, mapper: Box<dyn TaxonomyMapper>, version: TaxonomyVersion) -> Self {
        self.taxonomy = Some((mapper, version));
        self
    }

    pub fn rules(&self) -> Option<&RuleEngine> {
        self.rules.as_ref()
    }

    pub fn patterns(&self) -> &PatternTable {
        &self.patterns
    }

    /// Refine the raw categories of `host`, reached through `url`.
    pub fn refine(&self, host: &str, url: &str, categories: Vec<String>) -> Vec<String> {
        let mut categories = categories;

        if let Some(rules) = &self.rules {
            categories = rules.apply(host, url, categories);
            categories = self.patterns.classify(url, categories);
        }

        if let Some((mapper, version)) = &self.taxonomy {
            categories = map_categories(mapper.as_ref(), *version, &categories);
        }

        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_passthrough() {
        let refiner = Refiner::new();
        let input = cats(&["malware", "ads"]);
        assert_eq!(refiner.refine("x.com", "https://x.com", input.clone()), input);
    }

    #[test]
    fn test_pipeline_order() {
        let rule = SmartRule {
            name: "tube".to_string(),
            domains: vec!["tube.example".to_string()],
            remove_categories: cats(&["adult"]),
            ..SmartRule::default()
        };
        let patterns = PatternTable::parse("# Source: video\n/watch\n");
        let taxonomy = StaticTaxonomy::new().with_table(
            TaxonomyVersion::V3,
            [("video", "IAB-201"), ("video_content", "IAB-201-1")],
        );

        let refiner = Refiner::new()
            .with_rules(RuleEngine::from_rules(vec![rule]), patterns)
            .with_taxonomy(Box::new(taxonomy), TaxonomyVersion::V3);

        let out = refiner.refine(
            "tube.example",
            "https://tube.example/watch?v=1",
            cats(&["adult", "video"]),
        );
        assert_eq!(out, cats(&["IAB-201", "IAB-201-1"]));
    }
}
