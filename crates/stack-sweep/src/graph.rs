//! Dependency graph over resource kinds
//!
//! Edges express "the prerequisite kind must have finished deleting
//! before this kind starts". The edge set is validated at build time:
//! a cycle or a kind without a registered deleter is a configuration
//! error and aborts before any deletion traffic is sent.

use crate::registry;
use stack_sweep_common::ResourceKind;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Graph-configuration errors, all fatal at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("dependency cycle among resource kinds: {0}")]
    Cycle(String),

    #[error("no deleter registered for resource kind {0}")]
    MissingDeleter(ResourceKind),

    #[error("resource kind {0} appears twice in the node set")]
    DuplicateNode(ResourceKind),

    #[error("edge references resource kind {0} which is not in the node set")]
    UnknownNode(ResourceKind),
}

/// Edge direction: `.0` must wait for `.1` to finish.
pub type Edge = (ResourceKind, ResourceKind);

/// The default topology for a full project sweep.
///
/// Reads as "left waits for right": a router waits for its routes,
/// interfaces and gateways; a pool waits for its members, monitors and
/// L7 policies; a QoS policy waits for its rules and for the networks
/// that reference it.
const STANDARD_EDGES: &[Edge] = &[
    // Load-balancer tree, leaf first
    (ResourceKind::L7Policy, ResourceKind::L7Rule),
    (ResourceKind::Pool, ResourceKind::PoolMember),
    (ResourceKind::Pool, ResourceKind::HealthMonitor),
    (ResourceKind::Pool, ResourceKind::L7Policy),
    (ResourceKind::Listener, ResourceKind::Pool),
    (ResourceKind::LoadBalancer, ResourceKind::Listener),
    // Floating IPs carry port forwardings; routers carry FIPs
    (ResourceKind::FloatingIp, ResourceKind::PortForwarding),
    (ResourceKind::RouterInterface, ResourceKind::FloatingIp),
    (ResourceKind::RouterGateway, ResourceKind::FloatingIp),
    (ResourceKind::Router, ResourceKind::RouterRoute),
    (ResourceKind::Router, ResourceKind::RouterInterface),
    (ResourceKind::Router, ResourceKind::RouterGateway),
    // Ports are held by LBs, FIPs and router interfaces
    (ResourceKind::Port, ResourceKind::LoadBalancer),
    (ResourceKind::Port, ResourceKind::FloatingIp),
    (ResourceKind::Port, ResourceKind::RouterInterface),
    // Security groups cannot go while ports reference them
    (ResourceKind::SecurityGroup, ResourceKind::SecurityGroupRule),
    (ResourceKind::SecurityGroup, ResourceKind::Port),
    // Networking containment
    (ResourceKind::Subnet, ResourceKind::Port),
    (ResourceKind::Subnet, ResourceKind::RouterInterface),
    (ResourceKind::Subnet, ResourceKind::LoadBalancer),
    (ResourceKind::Network, ResourceKind::Subnet),
    (ResourceKind::Network, ResourceKind::Port),
    // QoS policies wait for their rules and referencing networks
    (ResourceKind::QosPolicy, ResourceKind::BandwidthLimitRule),
    (ResourceKind::QosPolicy, ResourceKind::DscpMarkingRule),
    (ResourceKind::QosPolicy, ResourceKind::MinimumBandwidthRule),
    (ResourceKind::QosPolicy, ResourceKind::Network),
    // Block storage
    (ResourceKind::Volume, ResourceKind::Snapshot),
];

/// A validated set of dependency nodes and prerequisite edges.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<ResourceKind>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    /// The full standard sweep graph: every kind except
    /// `VolumeAttachment` (detached inline by the volume deleter).
    pub fn standard() -> Self {
        let nodes = ResourceKind::ALL
            .into_iter()
            .filter(|k| *k != ResourceKind::VolumeAttachment)
            .collect();
        Self {
            nodes,
            edges: STANDARD_EDGES.to_vec(),
        }
    }

    /// A custom graph; used by tests and by callers that sweep a subset
    /// of kinds. Must be validated before use.
    pub fn new(nodes: Vec<ResourceKind>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn nodes(&self) -> &[ResourceKind] {
        &self.nodes
    }

    /// Number of prerequisite edges into `kind`.
    pub fn in_degree(&self, kind: ResourceKind) -> usize {
        self.edges.iter().filter(|(node, _)| *node == kind).count()
    }

    /// The kinds to notify once `kind` has finished.
    pub fn dependents(&self, kind: ResourceKind) -> Vec<ResourceKind> {
        self.edges
            .iter()
            .filter(|(_, prereq)| *prereq == kind)
            .map(|(node, _)| *node)
            .collect()
    }

    /// Check the configuration: unique nodes, edges within the node
    /// set, a deleter for every node, and no cycles (Kahn's algorithm).
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(*node) {
                return Err(GraphError::DuplicateNode(*node));
            }
            if !registry::has_deleter(*node) {
                return Err(GraphError::MissingDeleter(*node));
            }
        }

        for (node, prereq) in &self.edges {
            if !seen.contains(node) {
                return Err(GraphError::UnknownNode(*node));
            }
            if !seen.contains(prereq) {
                return Err(GraphError::UnknownNode(*prereq));
            }
        }

        // Kahn: repeatedly remove nodes with no unfinished prerequisites.
        let mut in_degree: HashMap<ResourceKind, usize> =
            self.nodes.iter().map(|n| (*n, self.in_degree(*n))).collect();
        let mut ready: VecDeque<ResourceKind> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut drained = 0usize;
        while let Some(node) = ready.pop_front() {
            drained += 1;
            for dependent in self.dependents(node) {
                let d = in_degree
                    .get_mut(&dependent)
                    .expect("edges checked against node set");
                *d -= 1;
                if *d == 0 {
                    ready.push_back(dependent);
                }
            }
        }
        if drained != self.nodes.len() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(n, _)| n.as_str())
                .collect();
            let mut stuck = stuck;
            stuck.sort_unstable();
            return Err(GraphError::Cycle(stuck.join(", ")));
        }
        Ok(())
    }
}
