//! Static deleter registry
//!
//! Maps each resource kind to its deletion routine at compile time.
//! Every routine discovers the kind's instances and runs the fan-out
//! barrier over them; the volume routine additionally detaches
//! attachments as a sequential pre-step inside each item's task.

use crate::api::{ApiError, ControlPlane, ProjectId, ResourceInstance};
use crate::barrier;
use crate::config::SweepOptions;
use backon::{BackoffBuilder, ExponentialBuilder};
use futures::future::BoxFuture;
use stack_sweep_common::{DeletionOutcome, ResourceKind, ResultSink};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A type-specific deletion routine: list, fan out, fan in.
pub type DeleteRoutine = fn(
    Arc<dyn ControlPlane>,
    ProjectId,
    SweepOptions,
) -> BoxFuture<'static, Result<ResultSink, ApiError>>;

/// Resolve a kind to its deletion routine.
///
/// `VolumeAttachment` has no routine: attachments are detached inline
/// by the volume deleter and never form a graph node.
pub fn deleter(kind: ResourceKind) -> Option<DeleteRoutine> {
    Some(match kind {
        ResourceKind::Network => delete_networks,
        ResourceKind::Subnet => delete_subnets,
        ResourceKind::Port => delete_ports,
        ResourceKind::Router => delete_routers,
        ResourceKind::RouterInterface => delete_router_interfaces,
        ResourceKind::RouterGateway => delete_router_gateways,
        ResourceKind::RouterRoute => delete_router_routes,
        ResourceKind::SecurityGroup => delete_security_groups,
        ResourceKind::SecurityGroupRule => delete_security_group_rules,
        ResourceKind::FloatingIp => delete_floating_ips,
        ResourceKind::PortForwarding => delete_port_forwardings,
        ResourceKind::QosPolicy => delete_qos_policies,
        ResourceKind::BandwidthLimitRule => delete_bandwidth_limit_rules,
        ResourceKind::DscpMarkingRule => delete_dscp_marking_rules,
        ResourceKind::MinimumBandwidthRule => delete_minimum_bandwidth_rules,
        ResourceKind::Volume => delete_volumes,
        ResourceKind::VolumeAttachment => return None,
        ResourceKind::Snapshot => delete_snapshots,
        ResourceKind::LoadBalancer => delete_load_balancers,
        ResourceKind::Listener => delete_listeners,
        ResourceKind::Pool => delete_pools,
        ResourceKind::PoolMember => delete_pool_members,
        ResourceKind::HealthMonitor => delete_health_monitors,
        ResourceKind::L7Policy => delete_l7_policies,
        ResourceKind::L7Rule => delete_l7_rules,
        ResourceKind::Image => delete_images,
    })
}

/// Whether `kind` can be a node in a dependency graph.
pub fn has_deleter(kind: ResourceKind) -> bool {
    deleter(kind).is_some()
}

macro_rules! routines {
    ($($name:ident => $kind:ident),+ $(,)?) => {
        $(
            fn $name(
                api: Arc<dyn ControlPlane>,
                project: ProjectId,
                opts: SweepOptions,
            ) -> BoxFuture<'static, Result<ResultSink, ApiError>> {
                Box::pin(sweep_kind(api, project, ResourceKind::$kind, opts))
            }
        )+
    };
}

routines! {
    delete_networks => Network,
    delete_subnets => Subnet,
    delete_ports => Port,
    delete_routers => Router,
    delete_router_interfaces => RouterInterface,
    delete_router_gateways => RouterGateway,
    delete_router_routes => RouterRoute,
    delete_security_groups => SecurityGroup,
    delete_security_group_rules => SecurityGroupRule,
    delete_floating_ips => FloatingIp,
    delete_port_forwardings => PortForwarding,
    delete_qos_policies => QosPolicy,
    delete_bandwidth_limit_rules => BandwidthLimitRule,
    delete_dscp_marking_rules => DscpMarkingRule,
    delete_minimum_bandwidth_rules => MinimumBandwidthRule,
    delete_volumes => Volume,
    delete_snapshots => Snapshot,
    delete_load_balancers => LoadBalancer,
    delete_listeners => Listener,
    delete_pools => Pool,
    delete_pool_members => PoolMember,
    delete_health_monitors => HealthMonitor,
    delete_l7_policies => L7Policy,
    delete_l7_rules => L7Rule,
    delete_images => Image,
}

/// Discover all instances of `kind` and delete them in parallel.
async fn sweep_kind(
    api: Arc<dyn ControlPlane>,
    project: ProjectId,
    kind: ResourceKind,
    opts: SweepOptions,
) -> Result<ResultSink, ApiError> {
    let instances = api.list(&project, kind).await?;
    info!(
        kind = %kind,
        project = %project,
        count = instances.len(),
        "discovered instances"
    );

    let items: Vec<_> = instances
        .into_iter()
        .map(|inst| {
            let params = item_parameters(kind, &inst);
            (inst, params)
        })
        .collect();

    let sink = barrier::delete_all(kind, items, move |inst: ResourceInstance| {
        let api = Arc::clone(&api);
        let project = project.clone();
        let opts = opts.clone();
        async move { delete_item(api, project, kind, inst, opts).await }
    })
    .await;

    info!(
        kind = %kind,
        succeeded = sink.successes().count(),
        failed = sink.failures().count(),
        "kind swept"
    );
    Ok(sink)
}

/// Delete one instance: detach pre-steps, then the delete call with
/// bounded retry on retryable errors. Never fails; every path produces
/// an outcome.
async fn delete_item(
    api: Arc<dyn ControlPlane>,
    project: ProjectId,
    kind: ResourceKind,
    instance: ResourceInstance,
    opts: SweepOptions,
) -> DeletionOutcome {
    let parameters = item_parameters(kind, &instance);
    let mut notes = Vec::new();

    // Attachments must be gone before the delete call; detaching is
    // sequential within this item's task.
    for attachment in &instance.attachments {
        match api
            .detach(&project, kind, &instance.id, attachment)
            .await
        {
            Ok(()) => {
                debug!(kind = %kind, id = %instance.id, attachment = %attachment, "detached");
            }
            Err(e) if e.is_not_found() => {
                debug!(kind = %kind, id = %instance.id, attachment = %attachment, "attachment already gone");
            }
            Err(e) => {
                warn!(
                    kind = %kind,
                    id = %instance.id,
                    attachment = %attachment,
                    error = %e,
                    "detach failed"
                );
                notes.push(format!("detach {attachment} failed: {e}"));
            }
        }
    }

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(opts.retry_initial_delay())
        .with_max_delay(opts.retry_max_delay())
        .with_factor(2.0)
        .with_jitter()
        .build()
        .into_iter();

    let mut attempt = 0u32;
    let result = loop {
        attempt += 1;
        match api.delete(&project, kind, &instance).await {
            Ok(response) => break Ok(response),
            Err(e) if e.is_not_found() => {
                debug!(kind = %kind, id = %instance.id, "already deleted");
                break Ok("not found (already deleted)".to_string());
            }
            Err(e) if e.is_retryable() && attempt < opts.max_delete_attempts => {
                let delay = delays.next().unwrap_or(opts.retry_max_delay());
                debug!(
                    kind = %kind,
                    id = %instance.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "delete failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => break Err(e),
        }
    };

    match result {
        Ok(response) => {
            let response = if notes.is_empty() {
                response
            } else {
                format!("{response} ({})", notes.join("; "))
            };
            DeletionOutcome::succeeded(parameters, response)
        }
        Err(e) => {
            warn!(kind = %kind, id = %instance.id, error = %e, "delete failed");
            notes.push(e.to_string());
            DeletionOutcome::failed(parameters, notes.join("; "))
        }
    }
}

/// Identifying parameters recorded in the item's outcome.
fn item_parameters(kind: ResourceKind, instance: &ResourceInstance) -> BTreeMap<String, String> {
    let mut params = instance.parameters.clone();
    params.insert(kind.param_key().to_string(), instance.id.clone());
    if let Some(parent) = &instance.parent {
        params.insert(parent_key(kind).to_string(), parent.clone());
    }
    params
}

/// Parameter key for the owning object of a nested resource.
fn parent_key(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::PortForwarding => "floatingip_id",
        ResourceKind::BandwidthLimitRule
        | ResourceKind::DscpMarkingRule
        | ResourceKind::MinimumBandwidthRule => "qos_policy_id",
        ResourceKind::PoolMember => "pool_id",
        ResourceKind::HealthMonitor => "pool_id",
        ResourceKind::L7Rule => "l7policy_id",
        ResourceKind::L7Policy => "listener_id",
        ResourceKind::Snapshot | ResourceKind::VolumeAttachment => "volume_id",
        _ => "parent_id",
    }
}
