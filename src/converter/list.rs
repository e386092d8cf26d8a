//! Blocklist dialects: hosts files, dnsmasq configs, uBlock filters and
//! plain domain-per-line lists.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::net::IpAddr;

use crate::host::normalise_host;

/// Number of significant lines inspected by [`detect_format`].
const DETECTION_WINDOW: usize = 20;

/// An IPv4 address followed by whitespace, as in `0.0.0.0 ads.example.com`.
static HOSTS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:\.\d{1,3}){3}\s").unwrap());

const DNSMASQ_MARKER: &str = "address=/";
const UBLOCK_MARKER: &str = "||";

/// Supported list dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListFormat {
    /// `0.0.0.0 example.com`
    Hosts,
    /// `address=/example.com/0.0.0.0`
    Dnsmasq,
    /// `||example.com^`
    Ublock,
    /// `example.com`
    Plain,
}

impl ListFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListFormat::Hosts => "hosts",
            ListFormat::Dnsmasq => "dnsmasq",
            ListFormat::Ublock => "ublock",
            ListFormat::Plain => "plain",
        }
    }
}

impl fmt::Display for ListFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lines that carry content: trimmed, non-empty, not a `#` comment.
fn significant_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Classify raw list text by looking at its first significant lines.
///
/// Precedence is hosts, then dnsmasq, then uBlock; anything else is plain.
pub fn detect_format(content: &str) -> ListFormat {
    let window: Vec<&str> = significant_lines(content).take(DETECTION_WINDOW).collect();

    if window.iter().any(|line| HOSTS_LINE.is_match(line)) {
        ListFormat::Hosts
    } else if window.iter().any(|line| line.contains(DNSMASQ_MARKER)) {
        ListFormat::Dnsmasq
    } else if window.iter().any(|line| line.starts_with(UBLOCK_MARKER)) {
        ListFormat::Ublock
    } else {
        ListFormat::Plain
    }
}

/// Extract host entries from list text in the given dialect.
///
/// Lines that do not have the dialect's shape are dropped.
pub fn parse(content: &str, format: ListFormat) -> Vec<String> {
    significant_lines(content)
        .filter_map(|line| match format {
            ListFormat::Hosts => parse_hosts_line(line),
            ListFormat::Dnsmasq => parse_dnsmasq_line(line),
            ListFormat::Ublock => parse_ublock_line(line),
            ListFormat::Plain => Some(line),
        })
        .filter_map(normalise_host)
        .collect()
}

/// Detect the dialect and parse in one step.
pub fn parse_auto(content: &str) -> (ListFormat, Vec<String>) {
    let format = detect_format(content);
    (format, parse(content, format))
}

fn parse_hosts_line(line: &str) -> Option<&str> {
    let mut tokens = line.split_whitespace();
    let address = tokens.next()?;
    address.parse::<IpAddr>().ok()?;
    tokens.next().filter(|host| !host.starts_with('#'))
}

fn parse_dnsmasq_line(line: &str) -> Option<&str> {
    let start = line.find(DNSMASQ_MARKER)? + DNSMASQ_MARKER.len();
    let rest = &line[start..];
    let end = rest.find('/')?;
    Some(&rest[..end])
}

fn parse_ublock_line(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(UBLOCK_MARKER)?;
    let end = rest.find(|c: char| c == '$' || c == '^').unwrap_or(rest.len());
    Some(&rest[..end])
}
