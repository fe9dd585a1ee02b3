//! Cloud resource types and deletion ordering
//!
//! Provides a consistent deletion order across all cleanup paths.
//! Resources must be deleted in dependency order to avoid failures
//! (e.g. a router cannot go while it still has interfaces attached).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Types of cloud resources swept by the cleanup orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// L7 rule on an L7 policy (must go before the policy)
    L7Rule,
    /// L7 policy on a listener
    L7Policy,
    /// Member of a load-balancer pool
    PoolMember,
    /// Health monitor attached to a pool
    HealthMonitor,
    /// Load-balancer pool (depends on members, monitors and L7 policies)
    Pool,
    /// Load-balancer listener
    Listener,
    /// Load balancer (deleted last in the LB tree)
    LoadBalancer,
    /// Port forwarding entry on a floating IP
    PortForwarding,
    /// Floating IP
    FloatingIp,
    /// Static route on a router (cleared via router update)
    RouterRoute,
    /// Router interface, one per (router, subnet) pair
    RouterInterface,
    /// External gateway on a router (cleared via router update)
    RouterGateway,
    /// Router (depends on routes, interfaces and gateways being gone)
    Router,
    /// Network port
    Port,
    /// Security group rule (must go before the group)
    SecurityGroupRule,
    /// Security group (depends on ports being gone)
    SecurityGroup,
    /// Volume snapshot (must go before the volume)
    Snapshot,
    /// Block-storage volume
    Volume,
    /// Volume attachment. Detached as a pre-step inside each volume's
    /// deletion task; never a graph node of its own.
    VolumeAttachment,
    /// Subnet
    Subnet,
    /// Network
    Network,
    /// QoS bandwidth-limit rule
    BandwidthLimitRule,
    /// QoS DSCP-marking rule
    DscpMarkingRule,
    /// QoS minimum-bandwidth rule
    MinimumBandwidthRule,
    /// QoS policy (depends on its rules and on networks referencing it)
    QosPolicy,
    /// Image
    Image,
}

impl ResourceKind {
    /// Every kind, in the canonical deletion/display order.
    ///
    /// The order is a fixed topological order of the default dependency
    /// graph: dependents appear before their prerequisites' consumers,
    /// so reading top to bottom mirrors the order deletions fire.
    pub const ALL: [ResourceKind; 26] = [
        ResourceKind::L7Rule,
        ResourceKind::L7Policy,
        ResourceKind::PoolMember,
        ResourceKind::HealthMonitor,
        ResourceKind::Pool,
        ResourceKind::Listener,
        ResourceKind::LoadBalancer,
        ResourceKind::PortForwarding,
        ResourceKind::FloatingIp,
        ResourceKind::RouterRoute,
        ResourceKind::RouterInterface,
        ResourceKind::RouterGateway,
        ResourceKind::Router,
        ResourceKind::Port,
        ResourceKind::SecurityGroupRule,
        ResourceKind::SecurityGroup,
        ResourceKind::Snapshot,
        ResourceKind::Volume,
        ResourceKind::VolumeAttachment,
        ResourceKind::Subnet,
        ResourceKind::Network,
        ResourceKind::BandwidthLimitRule,
        ResourceKind::DscpMarkingRule,
        ResourceKind::MinimumBandwidthRule,
        ResourceKind::QosPolicy,
        ResourceKind::Image,
    ];

    /// Stable wire/display name.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Port => "port",
            ResourceKind::Router => "router",
            ResourceKind::RouterInterface => "router_interface",
            ResourceKind::RouterGateway => "router_gateway",
            ResourceKind::RouterRoute => "router_route",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::SecurityGroupRule => "security_group_rule",
            ResourceKind::FloatingIp => "floatingip",
            ResourceKind::PortForwarding => "port_forwarding",
            ResourceKind::QosPolicy => "qos_policy",
            ResourceKind::BandwidthLimitRule => "bandwidth_limit_rule",
            ResourceKind::DscpMarkingRule => "dscp_marking_rule",
            ResourceKind::MinimumBandwidthRule => "minimum_bandwidth_rule",
            ResourceKind::Volume => "volume",
            ResourceKind::VolumeAttachment => "volume_attachment",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::LoadBalancer => "loadbalancer",
            ResourceKind::Listener => "listener",
            ResourceKind::Pool => "pool",
            ResourceKind::PoolMember => "pool_member",
            ResourceKind::HealthMonitor => "health_monitor",
            ResourceKind::L7Policy => "l7policy",
            ResourceKind::L7Rule => "l7rule",
            ResourceKind::Image => "image",
        }
    }

    /// Key under which an item's own id is recorded in outcome parameters
    /// (e.g. `router_id` for routers).
    pub fn param_key(self) -> &'static str {
        match self {
            ResourceKind::Network => "network_id",
            ResourceKind::Subnet => "subnet_id",
            ResourceKind::Port => "port_id",
            ResourceKind::Router
            | ResourceKind::RouterInterface
            | ResourceKind::RouterGateway
            | ResourceKind::RouterRoute => "router_id",
            ResourceKind::SecurityGroup => "security_group_id",
            ResourceKind::SecurityGroupRule => "security_group_rule_id",
            ResourceKind::FloatingIp => "floatingip_id",
            ResourceKind::PortForwarding => "port_forwarding_id",
            ResourceKind::QosPolicy => "qos_policy_id",
            ResourceKind::BandwidthLimitRule
            | ResourceKind::DscpMarkingRule
            | ResourceKind::MinimumBandwidthRule => "rule_id",
            ResourceKind::Volume => "volume_id",
            ResourceKind::VolumeAttachment => "attachment_id",
            ResourceKind::Snapshot => "snapshot_id",
            ResourceKind::LoadBalancer => "loadbalancer_id",
            ResourceKind::Listener => "listener_id",
            ResourceKind::Pool => "pool_id",
            ResourceKind::PoolMember => "member_id",
            ResourceKind::HealthMonitor => "healthmonitor_id",
            ResourceKind::L7Policy => "l7policy_id",
            ResourceKind::L7Rule => "l7rule_id",
            ResourceKind::Image => "image_id",
        }
    }

    /// Position in the canonical deletion/display order (lower = earlier).
    pub fn display_order(self) -> usize {
        // ALL is small enough that a linear scan beats maintaining a
        // second match arm per variant.
        Self::ALL
            .iter()
            .position(|k| *k == self)
            .expect("every kind appears in ALL")
    }
}

impl ResourceKind {
    /// Parse a wire/display name produced by [`ResourceKind::as_str`].
    pub fn from_str_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Serialized as the wire name so JSON reports match the display names.
impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_str_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown resource kind: {name}")))
    }
}
