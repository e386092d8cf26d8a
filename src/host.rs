//! Host extraction and normalisation shared by the parser, the query engine
//! and the dataset integrator.

use std::net::Ipv4Addr;
use url::Url;

/// Normalise a host token: trim, lowercase, drop a trailing dot and a
/// leading `www.`.
///
/// Returns `None` when nothing usable is left.
pub fn normalise_host(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    let host = match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    };
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return None;
    }
    Some(host)
}

/// Extract the host component from a URL or a bare domain.
///
/// Scheme, credentials, port, path and query are stripped. Bare inputs
/// such as `example.com/path` are parsed as if they were `http://` URLs.
pub fn extract_host(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let parsed = if input.contains("://") {
        Url::parse(input)
    } else {
        Url::parse(&format!("http://{}", input))
    };

    parsed
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .and_then(|h| normalise_host(&h))
}

/// Whether the host is an IPv4 literal (exact-match only semantics).
pub fn is_ipv4(host: &str) -> bool {
    host.parse::<Ipv4Addr>().is_ok()
}

/// Iterate a domain and its parent domains, most specific first.
///
/// `a.b.com` yields `a.b.com`, `b.com`, `com`.
pub fn suffixes(domain: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(domain);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.find('.').map(|pos| &current[pos + 1..]).filter(|s| !s.is_empty());
        Some(current)
    })
}

/// Domain-boundary-aware suffix match: equal, or a strict subdomain.
pub fn matches_domain(host: &str, entry: &str) -> bool {
    host == entry
        || (host.len() > entry.len()
            && host.ends_with(entry)
            && host.as_bytes()[host.len() - entry.len() - 1] == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_host() {
        assert_eq!(normalise_host("WWW.Example.COM."), Some("example.com".into()));
        assert_eq!(normalise_host("  bad.com "), Some("bad.com".into()));
        assert_eq!(normalise_host("www."), None);
        assert_eq!(normalise_host(""), None);
        assert_eq!(normalise_host("two words"), None);
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(
            extract_host("https://www.Example.com:8443/path?q=1"),
            Some("example.com".into())
        );
        assert_eq!(extract_host("sub.example.com"), Some("sub.example.com".into()));
        assert_eq!(extract_host("example.com/watch?v=1"), Some("example.com".into()));
        assert_eq!(extract_host("http://1.2.3.4/x"), Some("1.2.3.4".into()));
        assert_eq!(extract_host(""), None);
        assert_eq!(extract_host("http://"), None);
        assert_eq!(extract_host("http://exa mple.com"), None);
    }

    #[test]
    fn test_suffixes() {
        let all: Vec<&str> = suffixes("a.b.com").collect();
        assert_eq!(all, vec!["a.b.com", "b.com", "com"]);
        let single: Vec<&str> = suffixes("localhost").collect();
        assert_eq!(single, vec!["localhost"]);
    }

    #[test]
    fn test_matches_domain() {
        assert!(matches_domain("bad.com", "bad.com"));
        assert!(matches_domain("x.bad.com", "bad.com"));
        assert!(!matches_domain("notbad.com", "bad.com"));
        assert!(!matches_domain("com", "bad.com"));
    }

    #[test]
    fn test_is_ipv4() {
        assert!(is_ipv4("10.0.0.1"));
        assert!(!is_ipv4("10.0.0"));
        assert!(!is_ipv4("example.com"));
    }
}
