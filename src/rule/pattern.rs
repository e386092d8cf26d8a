//! Regex content patterns keyed by category.
//!
//! The pattern list is plain text. `# Source: <category>` switches the
//! active category, other `#` lines are comments, and every remaining line is
//! a regular expression for the active category:
//!
//! ```text
//! # Source: video
//! /watch\?v=
//! /embed/
//! ```
//!
//! The table is loaded once; a line that does not compile is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::FetchError;
use crate::fetch::Source;

/// Categories whose URLs are checked against the content patterns.
pub const VIDEO_CATEGORIES: &[&str] = &["video", "streaming", "video_streaming", "youtube"];

/// Suffix of the marker category added on a content match.
pub const CONTENT_SUFFIX: &str = "_content";

static SOURCE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#\s*Source:\s*(\S.*?)\s*$").unwrap());

/// Compiled patterns in file order.
#[derive(Debug, Default)]
pub struct PatternTable {
    sections: Vec<(String, Vec<Regex>)>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse pattern text.
    pub fn parse(content: &str) -> Self {
        let mut table = Self::new();
        let mut active: Option<String> = None;

        for line in content.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            if let Some(caps) = SOURCE_HEADER.captures(line) {
                active = Some(caps[1].to_string());
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            let Some(category) = &active else {
                log::debug!("Ignoring pattern {:?} outside any source section", line);
                continue;
            };
            match Regex::new(line) {
                Ok(re) => table.push(category, re),
                Err(e) => log::warn!("Skipping invalid pattern {:?} for {}: {}", line, category, e),
            }
        }

        table
    }

    /// Load from a local path, `file://` URL or `http(s)://` URL.
    ///
    /// Any failure yields an empty table.
    pub fn load(location: &str, timeout: Duration) -> Self {
        match read_location(location, timeout) {
            Ok(content) => {
                let table = Self::parse(&content);
                log::info!(
                    "Loaded {} content patterns in {} categories from {}",
                    table.pattern_count(),
                    table.sections.len(),
                    location
                );
                table
            }
            Err(e) => {
                log::warn!("Failed to load content patterns from {}: {}", location, e);
                Self::new()
            }
        }
    }

    fn push(&mut self, category: &str, re: Regex) {
        match self.sections.iter_mut().find(|(c, _)| c == category) {
            Some((_, patterns)) => patterns.push(re),
            None => self.sections.push((category.to_string(), vec![re])),
        }
    }

    pub fn patterns(&self, category: &str) -> &[Regex] {
        self.sections
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, p)| p.as_slice())
            .unwrap_or(&[])
    }

    pub fn pattern_count(&self) -> usize {
        self.sections.iter().map(|(_, p)| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Add `<category>_content` for each video-like category in `categories`
    /// whose patterns match `url`.
    pub fn classify(&self, url: &str, mut categories: Vec<String>) -> Vec<String> {
        let matched: Vec<String> = categories
            .iter()
            .filter(|c| VIDEO_CATEGORIES.contains(&c.as_str()))
            .filter(|c| self.patterns(c).iter().any(|re| re.is_match(url)))
            .map(|c| format!("{}{}", c, CONTENT_SUFFIX))
            .collect();

        for marker in matched {
            if !categories.contains(&marker) {
                categories.push(marker);
            }
        }
        categories
    }
}

fn read_location(location: &str, timeout: Duration) -> Result<String, FetchError> {
    if !location.contains("://") {
        return Ok(fs::read_to_string(Path::new(location))?);
    }
    match Source::parse(location)? {
        Source::File(path) => Ok(fs::read_to_string(path)?),
        Source::Http(url) => {
            let agent = ureq::AgentBuilder::new().timeout(timeout).build();
            Ok(agent.get(url.as_str()).call()?.into_string()?)
        }
    }
}
