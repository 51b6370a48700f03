//! Registry Metrics
//!
//! Prometheus counters for registry operations, kept in a dedicated
//! registry so several instances (and tests) never collide.

use crate::error::Result;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Prometheus metrics for the node registry
#[derive(Debug, Clone)]
pub struct RegistryMetrics {
    registry: Registry,
    pub registrations: IntCounter,
    pub duplicate_registrations: IntCounter,
    pub updates: IntCounter,
    pub deregistrations: IntCounter,
    pub nodes: IntGauge,
}

impl RegistryMetrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let registrations = IntCounter::new(
            "node_registry_registrations_total",
            "Total number of nodes registered",
        )?;
        let duplicate_registrations = IntCounter::new(
            "node_registry_duplicate_registrations_total",
            "Registrations ignored because the node was already registered",
        )?;
        let updates = IntCounter::new(
            "node_registry_updates_total",
            "Total number of applied node updates",
        )?;
        let deregistrations = IntCounter::new(
            "node_registry_deregistrations_total",
            "Total number of nodes deleted",
        )?;
        let nodes = IntGauge::new("node_registry_nodes", "Number of registered nodes")?;

        registry.register(Box::new(registrations.clone()))?;
        registry.register(Box::new(duplicate_registrations.clone()))?;
        registry.register(Box::new(updates.clone()))?;
        registry.register(Box::new(deregistrations.clone()))?;
        registry.register(Box::new(nodes.clone()))?;

        Ok(Self {
            registry,
            registrations,
            duplicate_registrations,
            updates,
            deregistrations,
            nodes,
        })
    }

    /// Render all metrics in the text exposition format
    pub fn encode(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_counters() {
        let metrics = RegistryMetrics::new().unwrap();
        metrics.registrations.inc();
        metrics.nodes.set(1);

        let (content_type, body) = metrics.encode().unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("node_registry_registrations_total 1"));
        assert!(text.contains("node_registry_nodes 1"));
    }

    #[test]
    fn test_independent_instances() {
        let a = RegistryMetrics::new().unwrap();
        let b = RegistryMetrics::new().unwrap();
        a.updates.inc();
        assert_eq!(a.updates.get(), 1);
        assert_eq!(b.updates.get(), 0);
    }
}
