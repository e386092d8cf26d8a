//! DNS resolution for `resolve_and_categorise`.

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::Resolver;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

/// Resolves a domain to its IP addresses.
pub trait DnsResolver: Send + Sync {
    fn resolve(&self, domain: &str) -> io::Result<Vec<IpAddr>>;
}

/// Uses the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl DnsResolver for SystemResolver {
    fn resolve(&self, domain: &str) -> io::Result<Vec<IpAddr>> {
        let mut ips: Vec<IpAddr> = (domain, 0).to_socket_addrs()?.map(|a| a.ip()).collect();
        ips.dedup();
        Ok(ips)
    }
}

/// Queries an explicit list of name servers over plain DNS.
pub struct ServerListResolver {
    resolver: Resolver,
}

impl ServerListResolver {
    pub fn new(servers: &[IpAddr], timeout: Duration) -> io::Result<Self> {
        let group = NameServerConfigGroup::from_ips_clear(servers, 53, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), group);
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        Ok(Self {
            resolver: Resolver::new(config, opts)?,
        })
    }
}

impl DnsResolver for ServerListResolver {
    fn resolve(&self, domain: &str) -> io::Result<Vec<IpAddr>> {
        let lookup = self
            .resolver
            .lookup_ip(domain)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(lookup.iter().collect())
    }
}

/// Pick the resolver for a configured server list.
///
/// An empty list, or a list the resolver cannot be built from, falls back to
/// the system resolver.
pub fn resolver_for(servers: &[IpAddr], timeout: Duration) -> Box<dyn DnsResolver> {
    if servers.is_empty() {
        return Box::new(SystemResolver);
    }
    match ServerListResolver::new(servers, timeout) {
        Ok(resolver) => Box::new(resolver),
        Err(e) => {
            log::warn!("Falling back to system DNS resolver: {}", e);
            Box::new(SystemResolver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_resolver_localhost() {
        let ips = SystemResolver.resolve("localhost").unwrap();
        assert!(ips.iter().any(|ip| ip.is_loopback()));
    }

    #[test]
    fn test_system_resolver_literal() {
        let ips = SystemResolver.resolve("127.0.0.1").unwrap();
        assert_eq!(ips, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }
}
