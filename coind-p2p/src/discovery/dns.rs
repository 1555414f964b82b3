//! DNS seed resolution.

use std::net::SocketAddr;

use coind_core::NetworkParams;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use crate::error::{P2pError, P2pResult};

/// DNS seed resolver.
pub struct DnsResolver {
    /// The async resolver.
    resolver: TokioAsyncResolver,
    /// Port used for seeds that do not name one.
    default_port: u16,
}

impl DnsResolver {
    /// Create a new DNS resolver.
    pub fn new(default_port: u16) -> Self {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self {
            resolver,
            default_port,
        }
    }

    /// Resolve a DNS seed (`host` or `host:port`) to peer addresses.
    pub async fn resolve_seed(&self, seed: &str) -> P2pResult<Vec<SocketAddr>> {
        let (host, port) = split_seed(seed, self.default_port)?;
        tracing::debug!(host, port, "Resolving DNS seed");

        let response = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| P2pError::DnsResolutionFailed {
                host: host.to_string(),
                error: e.to_string(),
            })?;

        let addrs: Vec<SocketAddr> = response
            .iter()
            .map(|ip| SocketAddr::new(ip, port))
            .collect();

        tracing::debug!(host, count = addrs.len(), "Resolved DNS seed");

        Ok(addrs)
    }

    /// Resolve multiple DNS seeds. Failures are logged and skipped.
    pub async fn resolve_seeds(&self, seeds: &[&str]) -> Vec<SocketAddr> {
        let mut all_addrs = Vec::new();

        for seed in seeds {
            match self.resolve_seed(seed).await {
                Ok(addrs) => all_addrs.extend(addrs),
                Err(e) => {
                    tracing::warn!(seed, error = %e, "Failed to resolve DNS seed");
                }
            }
        }

        // Remove duplicates
        all_addrs.sort();
        all_addrs.dedup();

        all_addrs
    }
}

/// Resolve every DNS seed of a network on its default port.
pub async fn bootstrap_addresses(params: &NetworkParams) -> Vec<SocketAddr> {
    if params.dns_seeds.is_empty() {
        return Vec::new();
    }
    let addrs = DnsResolver::new(params.port)
        .resolve_seeds(params.dns_seeds)
        .await;
    tracing::info!(network = params.name, count = addrs.len(), "DNS bootstrap finished");
    addrs
}

fn split_seed(seed: &str, default_port: u16) -> P2pResult<(&str, u16)> {
    match seed.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| P2pError::InvalidAddress(seed.to_string()))?;
            Ok((host, port))
        }
        None => Ok((seed, default_port)),
    }
}
