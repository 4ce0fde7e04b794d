//! Proxy endpoint type and random selection pool.

use std::fmt;
use std::net::IpAddr;

use rand::seq::SliceRandom;

/// One outbound proxy candidate: a validated IP literal plus port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub address: IpAddr,
    pub port: u16,
}

impl ProxyEndpoint {
    /// Parse from the raw address and port cells of the source table.
    /// Returns None for anything that is not an IP literal with a nonzero port.
    pub fn parse(address: &str, port: &str) -> Option<Self> {
        let address: IpAddr = address.trim().parse().ok()?;
        let port: u16 = port.trim().parse().ok()?;
        if port == 0 {
            return None;
        }
        Some(Self { address, port })
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Chrome's --proxy-server wants IPv6 literals bracketed.
        match self.address {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// Pool of endpoints for one run; rotation picks uniformly at random.
#[derive(Debug, Clone)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self { endpoints }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }

    /// One endpoint chosen uniformly at random, or None if the pool is empty.
    pub fn pick(&self) -> Option<&ProxyEndpoint> {
        self.endpoints.choose(&mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_ip_literals_only() {
        let ep = ProxyEndpoint::parse("203.0.113.7", "8080").unwrap();
        assert_eq!(ep.to_string(), "203.0.113.7:8080");

        let v6 = ProxyEndpoint::parse("2001:db8::1", "3128").unwrap();
        assert_eq!(v6.to_string(), "[2001:db8::1]:3128");

        assert!(ProxyEndpoint::parse("proxy.example.com", "8080").is_none());
        assert!(ProxyEndpoint::parse("203.0.113.7", "0").is_none());
        assert!(ProxyEndpoint::parse("203.0.113.7", "70000").is_none());
        assert!(ProxyEndpoint::parse("203.0.113.7", "http").is_none());
    }

    #[test]
    fn pick_from_empty_pool_is_none() {
        assert!(ProxyPool::new(vec![]).pick().is_none());
    }

    #[test]
    fn pick_always_returns_a_pool_member() {
        let pool = ProxyPool::new(vec![
            ProxyEndpoint::parse("203.0.113.1", "80").unwrap(),
            ProxyEndpoint::parse("203.0.113.2", "81").unwrap(),
        ]);
        for _ in 0..50 {
            let picked = pool.pick().unwrap();
            assert!(pool.endpoints().contains(picked));
        }
    }
}
