// src/core/resolver.rs

use std::collections::HashSet;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, info};

use crate::core::progress;

/// Outcome of the pre-probe resolution pass. `resolved` keeps host order and
/// carries the `;`-joined address annotation for each host.
#[derive(Debug, Default)]
pub struct Resolution {
    pub resolved: Vec<(String, String)>,
    pub unresolved: Vec<String>,
}

/// Best-effort lookup of all unique addresses for `host`: A/AAAA records
/// first, then a plain getaddrinfo call as fallback. Empty on total failure.
pub async fn resolve_host(resolver: &TokioAsyncResolver, host: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ips = Vec::new();

    match resolver.lookup_ip(host).await {
        Ok(lookup) => {
            for address in lookup.iter() {
                let text = address.to_string();
                if seen.insert(text.clone()) {
                    ips.push(text);
                }
            }
        }
        Err(e) => debug!(host, error = %e, "Record lookup failed, trying fallback."),
    }

    if ips.is_empty() {
        if let Ok(addresses) = tokio::net::lookup_host((host, 0u16)).await {
            for address in addresses {
                let text = address.ip().to_string();
                if seen.insert(text.clone()) {
                    ips.push(text);
                }
            }
        }
    }

    ips
}

/// Resolves every host sequentially, before probing begins. Resolution
/// failures are non-fatal; the caller decides whether unresolved hosts are
/// dropped or probed without an address annotation. Progress is reported
/// every 25 hosts and on the last one, counting resolved hosts as "live".
pub async fn resolve_hosts(hosts: &[String], show_progress: bool) -> Resolution {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let total = hosts.len();
    let mut resolution = Resolution::default();

    info!(total, "Resolving hosts.");
    for (i, host) in hosts.iter().enumerate() {
        let ips = resolve_host(&resolver, host).await;
        if ips.is_empty() {
            resolution.unresolved.push(host.clone());
        } else {
            resolution.resolved.push((host.clone(), ips.join(";")));
        }

        if show_progress && (i % 25 == 0 || i + 1 == total) {
            let resolved = resolution.resolved.len();
            progress::print_progress(i + 1, total, resolved, i + 1 - resolved);
        }
    }

    info!(
        resolved = resolution.resolved.len(),
        unresolved = resolution.unresolved.len(),
        "Resolution finished."
    );
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    // Loopback names resolve through the hosts file even without a reachable
    // DNS server, exercising at least the fallback path.
    #[tokio::test]
    async fn localhost_resolves_to_a_loopback_address() {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        let ips = resolve_host(&resolver, "localhost").await;
        assert!(!ips.is_empty());
        assert!(ips.iter().any(|ip| ip == "127.0.0.1" || ip == "::1"));
    }
}
