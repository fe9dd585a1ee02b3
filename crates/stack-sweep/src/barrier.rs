//! Fan-out/fan-in deletion barrier
//!
//! Runs one task per discovered item and returns only once every task
//! has reported an outcome. An item that fails or panics never
//! terminates the barrier or its siblings; it becomes a failed outcome
//! in the sink.

use futures::FutureExt;
use stack_sweep_common::{DeletionOutcome, ResourceKind, ResultSink};
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Delete every item in parallel and collect exactly `items.len()`
/// outcomes. `delete_one` receives the item and the identifying
/// parameters already derived for it.
pub async fn delete_all<T, F, Fut>(
    kind: ResourceKind,
    items: Vec<(T, BTreeMap<String, String>)>,
    delete_one: F,
) -> ResultSink
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = DeletionOutcome> + Send + 'static,
{
    let mut sink = ResultSink::with_capacity(kind, items.len());
    if items.is_empty() {
        debug!(kind = %kind, "no instances discovered, nothing to delete");
        return sink;
    }

    let mut tasks = JoinSet::new();
    for (item, parameters) in items {
        let fut = delete_one(item);
        tasks.spawn(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    // `as_ref` reaches the payload; `&panic` would make
                    // the Box itself the `dyn Any` and downcasts of the
                    // message would always miss.
                    let msg = panic_message(panic.as_ref());
                    warn!(kind = %kind, error = %msg, "deleter panicked");
                    DeletionOutcome::failed(parameters, format!("deleter panicked: {msg}"))
                }
            }
        });
    }

    // Fan-in: the sink is full exactly when every task has reported.
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => sink.push(outcome),
            // catch_unwind above makes this unreachable short of task
            // cancellation; keep the sink honest regardless.
            Err(err) => {
                warn!(kind = %kind, error = %err, "deletion task aborted");
                sink.push(DeletionOutcome::failed(
                    BTreeMap::new(),
                    format!("deletion task aborted: {err}"),
                ));
            }
        }
    }

    debug_assert!(sink.is_full());
    sink
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
