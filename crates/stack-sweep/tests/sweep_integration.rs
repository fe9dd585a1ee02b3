//! End-to-end sweeps against the in-memory control plane.

use stack_sweep::testing::{ApiOp, MockControlPlane};
use stack_sweep::{
    Cleaner, DependencyGraph, ProjectId, ProjectRunner, ResourceInstance, ResourceKind,
    SweepOptions,
};
use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn quick_opts() -> SweepOptions {
    init_logging();
    SweepOptions {
        node_timeout_secs: 30,
        max_delete_attempts: 3,
        retry_initial_delay_ms: 5,
        retry_max_delay_ms: 20,
    }
}

async fn run_graph(api: Arc<MockControlPlane>, graph: DependencyGraph) -> stack_sweep::ProjectReport {
    ProjectRunner::with_graph("test", ProjectId::new("p-1"), api, quick_opts(), graph)
        .unwrap()
        .run()
        .await
}

#[tokio::test]
async fn router_waits_for_all_children() {
    let children = [
        ResourceKind::RouterRoute,
        ResourceKind::RouterInterface,
        ResourceKind::RouterGateway,
    ];
    let mut api = MockControlPlane::new()
        .with_instance(ResourceKind::Router, ResourceInstance::new("r1"));
    for child in children {
        api = api
            .with_instance(child, ResourceInstance::new("r1"))
            .with_delete_delay(child, Duration::from_millis(20));
    }
    let api = Arc::new(api);

    let graph = DependencyGraph::new(
        vec![
            ResourceKind::Router,
            ResourceKind::RouterRoute,
            ResourceKind::RouterInterface,
            ResourceKind::RouterGateway,
        ],
        children
            .iter()
            .map(|child| (ResourceKind::Router, *child))
            .collect(),
    );
    let report = run_graph(Arc::clone(&api), graph).await;

    let router_start = api
        .first_call(ResourceKind::Router, ApiOp::DeleteStart)
        .unwrap();
    for child in children {
        let child_end = api.last_call(child, ApiOp::DeleteEnd).unwrap();
        assert!(
            child_end <= router_start,
            "{child} finished after the router started"
        );
    }
    assert_eq!(report.kind(ResourceKind::Router).succeeded.len(), 1);
}

#[tokio::test]
async fn one_faulty_item_does_not_poison_its_kind() {
    let mut api = MockControlPlane::new().panicking("n3");
    for id in ["n1", "n2", "n3", "n4", "n5"] {
        api = api.with_instance(ResourceKind::Network, ResourceInstance::new(id));
    }
    let api = Arc::new(api);

    let graph = DependencyGraph::new(vec![ResourceKind::Network], vec![]);
    let report = run_graph(api, graph).await;

    let row = report.kind(ResourceKind::Network);
    assert_eq!(row.attempted, 5);
    assert_eq!(row.succeeded.len(), 4);
    assert_eq!(row.failed.len(), 1);
    let failure = &row.failed[0];
    assert!(failure.response.contains("injected deleter fault"));
    assert_eq!(
        failure.parameters.get("network_id").map(String::as_str),
        Some("n3")
    );
}

#[tokio::test]
async fn unknown_projects_are_skipped() {
    let api = Arc::new(
        MockControlPlane::new()
            .with_project("projA", "id-a")
            .with_project("projB", "id-b")
            .unresolvable("flaky"),
    );
    let cleaner = Cleaner::new(api, quick_opts());
    let report = cleaner
        .run(&["projA", "ghost", "flaky", "projB"])
        .await
        .unwrap();

    let names: Vec<_> = report.projects.iter().map(|p| p.project.as_str()).collect();
    assert_eq!(names, ["projA", "projB"]);
    assert_eq!(report.skipped_projects, ["ghost", "flaky"]);
}

#[tokio::test]
async fn isolated_kind_runs_without_gating() {
    let api = Arc::new(
        MockControlPlane::new()
            .with_instance(ResourceKind::Image, ResourceInstance::new("img-1"))
            .with_instance(ResourceKind::Network, ResourceInstance::new("net-1"))
            .with_instance(ResourceKind::Subnet, ResourceInstance::new("sub-1"))
            .with_delete_delay(ResourceKind::Subnet, Duration::from_millis(20)),
    );
    let graph = DependencyGraph::new(
        vec![ResourceKind::Image, ResourceKind::Network, ResourceKind::Subnet],
        vec![(ResourceKind::Network, ResourceKind::Subnet)],
    );
    let report = run_graph(Arc::clone(&api), graph).await;

    assert_eq!(report.kind(ResourceKind::Image).succeeded.len(), 1);
    assert_eq!(report.kind(ResourceKind::Network).succeeded.len(), 1);
    let subnet_end = api
        .last_call(ResourceKind::Subnet, ApiOp::DeleteEnd)
        .unwrap();
    let network_start = api
        .first_call(ResourceKind::Network, ApiOp::DeleteStart)
        .unwrap();
    assert!(subnet_end <= network_start);
}

#[tokio::test]
async fn empty_kind_still_notifies_dependents() {
    let api = Arc::new(
        MockControlPlane::new()
            .with_instance(ResourceKind::Subnet, ResourceInstance::new("sub-1")),
    );
    let graph = DependencyGraph::new(
        vec![ResourceKind::Subnet, ResourceKind::Port],
        vec![(ResourceKind::Subnet, ResourceKind::Port)],
    );
    let report = run_graph(Arc::clone(&api), graph).await;

    assert_eq!(api.call_count(ResourceKind::Port, ApiOp::List), 1);
    assert_eq!(report.kind(ResourceKind::Port).attempted, 0);
    assert_eq!(report.kind(ResourceKind::Subnet).succeeded.len(), 1);
}

#[tokio::test]
async fn timed_out_node_degrades_and_graph_drains() {
    let api = Arc::new(
        MockControlPlane::new()
            .hanging(ResourceKind::Network)
            .with_instance(ResourceKind::Network, ResourceInstance::new("net-1"))
            .with_instance(ResourceKind::QosPolicy, ResourceInstance::new("qos-1")),
    );
    let graph = DependencyGraph::new(
        vec![ResourceKind::QosPolicy, ResourceKind::Network],
        vec![(ResourceKind::QosPolicy, ResourceKind::Network)],
    );
    let opts = SweepOptions {
        node_timeout_secs: 1,
        ..quick_opts()
    };
    let report =
        ProjectRunner::with_graph("test", ProjectId::new("p-1"), api, opts, graph)
            .unwrap()
            .run()
            .await;

    let network = report.kind(ResourceKind::Network);
    assert_eq!(network.failed.len(), 1);
    assert!(network.failed[0].response.contains("deadline"));
    assert_eq!(report.kind(ResourceKind::QosPolicy).succeeded.len(), 1);
}

#[tokio::test]
async fn list_error_degrades_node_but_dependents_proceed() {
    let api = Arc::new(
        MockControlPlane::new()
            .list_erroring(ResourceKind::Network)
            .with_instance(ResourceKind::QosPolicy, ResourceInstance::new("qos-1")),
    );
    let graph = DependencyGraph::new(
        vec![ResourceKind::QosPolicy, ResourceKind::Network],
        vec![(ResourceKind::QosPolicy, ResourceKind::Network)],
    );
    let report = run_graph(api, graph).await;

    let network = report.kind(ResourceKind::Network);
    assert_eq!(network.failed.len(), 1);
    assert!(network.failed[0].response.contains("discovery failed"));
    assert_eq!(report.kind(ResourceKind::QosPolicy).succeeded.len(), 1);
}

#[tokio::test]
async fn volume_attachments_detach_before_delete() {
    let api = Arc::new(MockControlPlane::new().with_instance(
        ResourceKind::Volume,
        ResourceInstance::new("v1")
            .with_attachment("a1")
            .with_attachment("a2"),
    ));
    let graph = DependencyGraph::new(vec![ResourceKind::Volume], vec![]);
    let report = run_graph(Arc::clone(&api), graph).await;

    assert_eq!(api.call_count(ResourceKind::Volume, ApiOp::Detach), 2);
    let last_detach = api.last_call(ResourceKind::Volume, ApiOp::Detach).unwrap();
    let delete_start = api
        .first_call(ResourceKind::Volume, ApiOp::DeleteStart)
        .unwrap();
    assert!(last_detach <= delete_start);
    let row = report.kind(ResourceKind::Volume);
    assert_eq!(row.succeeded.len(), 1);
    assert_eq!(
        row.succeeded[0].get("volume_id").map(String::as_str),
        Some("v1")
    );
}

#[tokio::test]
async fn detach_failure_is_noted_but_delete_proceeds() {
    let api = Arc::new(
        MockControlPlane::new()
            .detach_failing("a1")
            .with_instance(
                ResourceKind::Volume,
                ResourceInstance::new("v1").with_attachment("a1"),
            ),
    );
    let graph = DependencyGraph::new(vec![ResourceKind::Volume], vec![]);
    let report = run_graph(Arc::clone(&api), graph).await;

    assert_eq!(api.call_count(ResourceKind::Volume, ApiOp::DeleteStart), 1);
    let row = report.kind(ResourceKind::Volume);
    assert_eq!(row.attempted, 1);
    // Delete itself succeeded; the detach note rides on the outcome.
    assert_eq!(row.succeeded.len(), 1);
}

#[tokio::test]
async fn already_deleted_counts_as_success() {
    let api = Arc::new(
        MockControlPlane::new()
            .gone("net-1")
            .with_instance(ResourceKind::Network, ResourceInstance::new("net-1")),
    );
    let graph = DependencyGraph::new(vec![ResourceKind::Network], vec![]);
    let report = run_graph(api, graph).await;

    let row = report.kind(ResourceKind::Network);
    assert_eq!(row.succeeded.len(), 1);
    assert_eq!(row.failed.len(), 0);
}

#[tokio::test]
async fn conflict_is_retried_until_success() {
    let api = Arc::new(
        MockControlPlane::new()
            .conflicting("p1", 1)
            .with_instance(ResourceKind::Port, ResourceInstance::new("p1")),
    );
    let graph = DependencyGraph::new(vec![ResourceKind::Port], vec![]);
    let report = run_graph(Arc::clone(&api), graph).await;

    assert_eq!(api.call_count(ResourceKind::Port, ApiOp::DeleteStart), 2);
    assert_eq!(report.kind(ResourceKind::Port).succeeded.len(), 1);
}

#[tokio::test]
async fn retries_are_bounded() {
    let api = Arc::new(
        MockControlPlane::new()
            .conflicting("p1", 10)
            .with_instance(ResourceKind::Port, ResourceInstance::new("p1")),
    );
    let graph = DependencyGraph::new(vec![ResourceKind::Port], vec![]);
    let opts = SweepOptions {
        max_delete_attempts: 2,
        ..quick_opts()
    };
    let report =
        ProjectRunner::with_graph("test", ProjectId::new("p-1"), api.clone(), opts, graph)
            .unwrap()
            .run()
            .await;

    assert_eq!(api.call_count(ResourceKind::Port, ApiOp::DeleteStart), 2);
    let row = report.kind(ResourceKind::Port);
    assert_eq!(row.failed.len(), 1);
    assert!(row.failed[0].response.contains("still in use"));
}

#[tokio::test]
async fn chain_deletes_in_dependency_order() {
    let chain = [
        ResourceKind::PoolMember,
        ResourceKind::Pool,
        ResourceKind::Listener,
    ];
    let mut api = MockControlPlane::new();
    for (i, kind) in chain.iter().enumerate() {
        api = api
            .with_instance(*kind, ResourceInstance::new(format!("x{i}")))
            .with_delete_delay(*kind, Duration::from_millis(10));
    }
    let api = Arc::new(api);

    let graph = DependencyGraph::new(
        chain.to_vec(),
        vec![
            (ResourceKind::Pool, ResourceKind::PoolMember),
            (ResourceKind::Listener, ResourceKind::Pool),
        ],
    );
    let report = run_graph(Arc::clone(&api), graph).await;

    for pair in chain.windows(2) {
        let earlier_end = api.last_call(pair[0], ApiOp::DeleteEnd).unwrap();
        let later_start = api.first_call(pair[1], ApiOp::DeleteStart).unwrap();
        assert!(
            earlier_end <= later_start,
            "{} started before {} finished",
            pair[1],
            pair[0]
        );
    }
    assert_eq!(report.total_failed(), 0);
}

#[tokio::test]
async fn deletes_within_a_kind_run_in_parallel() {
    let mut api =
        MockControlPlane::new().with_delete_delay(ResourceKind::Network, Duration::from_millis(50));
    for id in ["n1", "n2", "n3"] {
        api = api.with_instance(ResourceKind::Network, ResourceInstance::new(id));
    }
    let api = Arc::new(api);

    let graph = DependencyGraph::new(vec![ResourceKind::Network], vec![]);
    let started = tokio::time::Instant::now();
    let report = run_graph(api, graph).await;
    let elapsed = started.elapsed();

    assert_eq!(report.kind(ResourceKind::Network).succeeded.len(), 3);
    // Serial execution would take at least 150ms.
    assert!(elapsed < Duration::from_millis(140), "took {elapsed:?}");
}

#[tokio::test]
async fn standard_graph_sweeps_a_populated_project() {
    let api = Arc::new(
        MockControlPlane::new()
            .with_project("projA", "id-a")
            .with_instance(ResourceKind::Network, ResourceInstance::new("net-1"))
            .with_instance(
                ResourceKind::Subnet,
                ResourceInstance::new("sub-1").with_parameter("network_id", "net-1"),
            )
            .with_instance(ResourceKind::Port, ResourceInstance::new("port-1"))
            .with_instance(ResourceKind::Router, ResourceInstance::new("r1"))
            .with_instance(
                ResourceKind::RouterInterface,
                ResourceInstance::new("r1").with_parameter("subnet_id", "sub-1"),
            )
            .with_instance(
                ResourceKind::Volume,
                ResourceInstance::new("v1").with_attachment("srv-1"),
            )
            .with_instance(ResourceKind::Image, ResourceInstance::new("img-1")),
    );
    let cleaner = Cleaner::new(api.clone(), quick_opts());
    let report = cleaner.run(&["projA"]).await.unwrap();

    assert_eq!(report.projects.len(), 1);
    let project = report.project("projA").unwrap();
    assert_eq!(project.kinds.len(), ResourceKind::ALL.len());
    assert_eq!(project.total_attempted(), 7);
    assert_eq!(project.total_failed(), 0);

    // Every kind in the standard topology gets listed exactly once.
    for kind in ResourceKind::ALL {
        if kind == ResourceKind::VolumeAttachment {
            assert_eq!(api.call_count(kind, ApiOp::List), 0);
        } else {
            assert_eq!(api.call_count(kind, ApiOp::List), 1, "{kind} not listed once");
        }
    }

    // The router interface had to finish before its router and subnet.
    let iface_end = api
        .last_call(ResourceKind::RouterInterface, ApiOp::DeleteEnd)
        .unwrap();
    let router_start = api
        .first_call(ResourceKind::Router, ApiOp::DeleteStart)
        .unwrap();
    let subnet_start = api
        .first_call(ResourceKind::Subnet, ApiOp::DeleteStart)
        .unwrap();
    assert!(iface_end <= router_start);
    assert!(iface_end <= subnet_start);
}

#[tokio::test]
async fn projects_are_swept_concurrently() {
    let api = Arc::new(
        MockControlPlane::new()
            .with_project("projA", "id-a")
            .with_project("projB", "id-b")
            .with_instance(ResourceKind::Image, ResourceInstance::new("img-1")),
    );
    let cleaner = Cleaner::new(api, quick_opts());
    let report = cleaner.run(&["projB", "projA"]).await.unwrap();

    let names: Vec<_> = report.projects.iter().map(|p| p.project.as_str()).collect();
    assert_eq!(names, ["projA", "projB"]);
    for project in &report.projects {
        assert_eq!(project.kind(ResourceKind::Image).attempted, 1);
    }
}
