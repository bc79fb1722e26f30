mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use agora::{
    node_fn, AgoraError, ConversationState, Graph, Next, Node, ParallelNode, State, SubGraphNode,
    END,
};

fn set_value(key: &'static str, value: i64) -> impl Node<ConversationState> {
    node_fn::<ConversationState, _>(move |_cancel, state| {
        Box::pin(async move {
            state.set(key, serde_json::json!(value))?;
            Ok(Next::Continue)
        })
    })
}

fn increment(key: &'static str) -> Arc<dyn Node<ConversationState>> {
    Arc::new(node_fn::<ConversationState, _>(move |_cancel, state| {
        Box::pin(async move {
            let current = state.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
            state.set(key, serde_json::json!(current + 1))?;
            Ok(Next::Continue)
        })
    }))
}

/// Sums every counter the branches touched into the original state.
fn sum_counters(original: &ConversationState, results: Vec<ConversationState>) -> ConversationState {
    let mut merged = original.clone();
    for result in &results {
        for (key, value) in result.values() {
            if original.get(key).is_some() {
                continue;
            }
            let total = merged.get(key).and_then(|v| v.as_i64()).unwrap_or(0)
                + value.as_i64().unwrap_or(0);
            merged.set(key, serde_json::json!(total)).unwrap();
        }
    }
    merged
}

#[tokio::test]
async fn test_two_node_linear_graph() {
    common::init_tracing();

    let mut graph: Graph<ConversationState> = Graph::new();
    graph
        .add_node_fn("a", |_cancel, state| {
            Box::pin(async move {
                state.set("first", serde_json::json!("set by a"))?;
                Ok(Next::goto("b"))
            })
        })
        .unwrap();
    graph
        .add_node_fn("b", |_cancel, state| {
            Box::pin(async move {
                state.set("second", serde_json::json!("set by b"))?;
                Ok(Next::End)
            })
        })
        .unwrap();
    graph.set_entry("a");

    let result = graph
        .execute(&CancellationToken::new(), ConversationState::default())
        .await
        .unwrap();
    assert_eq!(result.state.get("first"), Some(serde_json::json!("set by a")));
    assert_eq!(result.state.get("second"), Some(serde_json::json!("set by b")));
}

#[tokio::test]
async fn test_cycle_stops_at_default_budget() {
    common::init_tracing();

    let mut graph: Graph<ConversationState> = Graph::new();
    graph
        .add_node_fn("ping", |_cancel, state| {
            Box::pin(async move {
                let n = state.get("visits").and_then(|v| v.as_u64()).unwrap_or(0);
                state.set("visits", serde_json::json!(n + 1))?;
                Ok(Next::goto("pong"))
            })
        })
        .unwrap();
    graph
        .add_node_fn("pong", |_cancel, _state| {
            Box::pin(async move { Ok(Next::goto("ping")) })
        })
        .unwrap();
    graph.set_entry("ping");

    let failure = graph
        .execute(&CancellationToken::new(), ConversationState::default())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, AgoraError::MaxStepsExceeded(25)));
    assert_eq!(failure.node_results.len(), 25);
    assert_eq!(failure.state.get("visits"), Some(serde_json::json!(13)));
}

#[tokio::test]
async fn test_cancel_before_execute_runs_nothing() {
    common::init_tracing();

    let mut graph = Graph::new();
    graph.add_node("a", set_value("touched", 1)).unwrap();
    graph.set_entry("a");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let failure = graph
        .execute(&cancel, ConversationState::default())
        .await
        .unwrap_err();

    assert!(failure.error.is_cancelled());
    assert_eq!(failure.state.get("touched"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fan_out_inside_sub_graph() {
    common::init_tracing();

    let fan_out = ParallelNode::new(
        vec![increment("alpha"), increment("beta"), increment("gamma")],
        sum_counters,
    );

    let mut inner = Graph::new();
    inner.add_node("fan_out", fan_out).unwrap();
    inner.add_node("mark", set_value("inner_done", 1)).unwrap();
    inner.add_edge("fan_out", "mark");
    inner.add_edge("mark", END);
    inner.set_entry("fan_out");

    let mut outer = Graph::new();
    outer.add_node("setup", set_value("base", 100)).unwrap();
    outer.add_node("nested", SubGraphNode::new(inner)).unwrap();
    outer.add_edge("setup", "nested");
    outer.set_entry("setup");
    outer.validate().unwrap();

    let result = outer
        .execute(&CancellationToken::new(), ConversationState::new("go"))
        .await
        .unwrap();

    let state = &result.state;
    assert_eq!(state.get("base"), Some(serde_json::json!(100)));
    // Each branch saw only its own counter.
    assert_eq!(state.get("alpha"), Some(serde_json::json!(1)));
    assert_eq!(state.get("beta"), Some(serde_json::json!(1)));
    assert_eq!(state.get("gamma"), Some(serde_json::json!(1)));
    assert_eq!(state.get("inner_done"), Some(serde_json::json!(1)));
    assert_eq!(result.path(), ["setup", "nested"]);
}

#[tokio::test]
async fn test_branch_failure_inside_sub_graph() {
    common::init_tracing();

    let failing: Arc<dyn Node<ConversationState>> =
        Arc::new(node_fn::<ConversationState, _>(|_cancel, _state| {
            Box::pin(async move { Err(AgoraError::State("branch two broke".into())) })
        }));
    let fan_out = ParallelNode::new(
        vec![increment("alpha"), failing, increment("gamma")],
        sum_counters,
    );

    let mut inner = Graph::new();
    inner.add_node("fan_out", fan_out).unwrap();
    inner.set_entry("fan_out");

    let mut outer = Graph::new();
    outer.add_node("nested", SubGraphNode::new(inner)).unwrap();
    outer.set_entry("nested");

    let failure = outer
        .execute(&CancellationToken::new(), ConversationState::default())
        .await
        .unwrap_err();

    assert_eq!(failure.error.failing_nodes(), vec!["nested", "fan_out"]);
    assert!(matches!(failure.error.root_cause(), AgoraError::State(_)));
    assert_eq!(failure.state.get("alpha"), None);
    assert_eq!(failure.state.get("gamma"), None);
}
