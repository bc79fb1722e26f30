use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use agora_core::error::{AgoraError, Result};
use agora_core::event::EventBus;
use agora_core::traits::State;
use agora_core::types::{ChatMessage, GraphEvent, ToolCall, ToolResult};
use agora_tools::ToolRegistry;

use crate::graph::{Next, Node};

/// The execution half of a tool-calling loop.
///
/// Runs every pending tool call in order and appends each result as a tool
/// turn linked to its call. Unknown tools and tool failures become error text
/// for the model to read; only cancellation stops the step. The pending calls
/// are cleared afterwards. With nothing pending the node does nothing.
pub struct ToolExecutorNode {
    registry: Arc<ToolRegistry>,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolExecutorNode {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            event_bus: None,
        }
    }

    /// Publish `ToolStart`/`ToolEnd` events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    fn publish(&self, event: GraphEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run one call. Fails only when the run is cancelled.
    async fn call_tool(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<ToolResult> {
        if self.registry.get(&call.name).is_none() {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return Ok(ToolResult::error(format!(
                "Error: Tool '{}' not found",
                call.name
            )));
        }

        let outcome = self
            .registry
            .execute(&call.name, call.arguments.clone(), cancel.clone())
            .await;

        let result = match outcome {
            Ok(value) => match serde_json::to_string(&value) {
                Ok(text) => ToolResult::success(text),
                Err(e) => ToolResult::error(format!(
                    "Error executing tool '{}': result is not serializable: {}",
                    call.name, e
                )),
            },
            Err(AgoraError::Cancelled) => return Err(AgoraError::Cancelled),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::error(format!("Error executing tool '{}': {}", call.name, e))
            }
        };
        Ok(result)
    }

    async fn execute_pending<S: State>(
        &self,
        cancel: &CancellationToken,
        state: &mut S,
    ) -> Result<()> {
        let calls = state.tool_calls()?;
        if calls.is_empty() {
            debug!("No pending tool calls");
            return Ok(());
        }

        for call in &calls {
            if cancel.is_cancelled() {
                return Err(AgoraError::Cancelled);
            }
            debug!(tool = %call.name, call_id = %call.id, "Executing tool call");
            self.publish(GraphEvent::ToolStart {
                name: call.name.clone(),
                arguments: serde_json::Value::Object(call.arguments.clone()),
            });

            let result = self.call_tool(call, cancel).await?;

            self.publish(GraphEvent::ToolEnd {
                name: call.name.clone(),
                result: result.clone(),
            });
            state.append_turn(ChatMessage::tool_result(call.id.clone(), result.content))?;
        }

        state.set_tool_calls(&[])?;
        Ok(())
    }
}

impl<S: State> Node<S> for ToolExecutorNode {
    fn run<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        state: &'a mut S,
    ) -> BoxFuture<'a, Result<Next>> {
        Box::pin(async move {
            self.execute_pending(cancel, state).await?;
            Ok(Next::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use agora_core::state::ConversationState;
    use agora_core::traits::Tool;
    use agora_core::types::{Role, ToolArgs};
    use agora_test_utils::{tool_args, EchoTool, FailingTool, SlowTool};

    fn pending(calls: &[(&str, &str, serde_json::Value)]) -> ConversationState {
        let mut state = ConversationState::new("do things");
        let calls: Vec<ToolCall> = calls
            .iter()
            .map(|(id, name, args)| ToolCall::new(*id, *name, tool_args(args.clone())))
            .collect();
        state.set_tool_calls(&calls).unwrap();
        state
    }

    fn tool_turns(state: &ConversationState) -> Vec<&ChatMessage> {
        state
            .history()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect()
    }

    #[tokio::test]
    async fn test_no_pending_calls_is_noop() {
        let node = ToolExecutorNode::new(Arc::new(ToolRegistry::new()));
        let mut state = ConversationState::new("hi");
        let before = state.clone();

        let next = node.run(&CancellationToken::new(), &mut state).await.unwrap();
        assert_eq!(next, Next::Continue);
        assert_eq!(state, before);
    }

    /// A registered tool whose own work looks up another tool that is absent.
    struct DispatchTool;

    impl Tool for DispatchTool {
        fn name(&self) -> &str {
            "dispatch"
        }

        fn description(&self) -> &str {
            "Forwards to a downstream tool"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }

        fn execute(
            &self,
            _cancel: CancellationToken,
            _args: ToolArgs,
        ) -> BoxFuture<'_, Result<serde_json::Value>> {
            Box::pin(async move { Err(AgoraError::ToolNotFound("inner".into())) })
        }
    }

    #[tokio::test]
    async fn test_not_found_inside_registered_tool_is_execution_error() {
        let mut registry = ToolRegistry::new();
        registry.register(DispatchTool);
        let node = ToolExecutorNode::new(Arc::new(registry));
        let mut state = pending(&[("call_1", "dispatch", serde_json::json!({}))]);

        node.run(&CancellationToken::new(), &mut state).await.unwrap();

        let turns = tool_turns(&state);
        assert_eq!(turns.len(), 1);
        assert!(turns[0]
            .content
            .starts_with("Error executing tool 'dispatch':"));
        assert!(turns[0].content.contains("inner"));
    }

    #[tokio::test]
    async fn test_missing_tool_becomes_error_text() {
        let node = ToolExecutorNode::new(Arc::new(ToolRegistry::new()));
        let mut state = pending(&[("call_1", "lookup", serde_json::json!({}))]);

        node.run(&CancellationToken::new(), &mut state).await.unwrap();

        let turns = tool_turns(&state);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "Error: Tool 'lookup' not found");
        assert_eq!(turns[0].tool_call_id.as_deref(), Some("call_1"));
        assert!(state.tool_calls().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_results_appended_in_call_order() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("echo"));
        registry.register(FailingTool::new("broken", "disk full"));
        let node = ToolExecutorNode::new(Arc::new(registry));

        let mut state = pending(&[
            ("c1", "echo", serde_json::json!({"x": 1})),
            ("c2", "broken", serde_json::json!({})),
            ("c3", "echo", serde_json::json!({"y": "z"})),
        ]);
        let history_before = state.history().len();

        node.run(&CancellationToken::new(), &mut state).await.unwrap();

        let turns = tool_turns(&state);
        let ids: Vec<&str> = turns
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
        assert_eq!(turns[0].content, r#"{"x":1}"#);
        assert!(turns[1].content.starts_with("Error executing tool 'broken':"));
        assert!(turns[1].content.contains("disk full"));
        assert_eq!(turns[2].content, r#"{"y":"z"}"#);
        // Each result is recorded as a full turn.
        assert_eq!(state.history().len(), history_before + 6);
        assert!(state.tool_calls().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error_text() {
        let mut registry = ToolRegistry::new().with_default_timeout(1);
        registry.register(SlowTool::new("slow", Duration::from_secs(5)));
        let node = ToolExecutorNode::new(Arc::new(registry));

        let mut state = pending(&[("c1", "slow", serde_json::json!({}))]);
        node.run(&CancellationToken::new(), &mut state).await.unwrap();

        let turns = tool_turns(&state);
        assert!(turns[0].content.starts_with("Error executing tool 'slow':"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_step() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool::new("slow", Duration::from_secs(60)));
        let node = ToolExecutorNode::new(Arc::new(registry));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let mut state = pending(&[("c1", "slow", serde_json::json!({}))]);
        let err = node.run(&cancel, &mut state).await.unwrap_err();

        assert!(matches!(err, AgoraError::Cancelled));
        assert!(tool_turns(&state).is_empty());
        assert_eq!(state.tool_calls().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_events_published() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();

        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("echo"));
        let node = ToolExecutorNode::new(Arc::new(registry)).with_event_bus(bus);

        let mut state = pending(&[("c1", "echo", serde_json::json!({"a": true}))]);
        node.run(&CancellationToken::new(), &mut state).await.unwrap();

        match rx.try_recv().unwrap() {
            GraphEvent::ToolStart { name, arguments } => {
                assert_eq!(name, "echo");
                assert_eq!(arguments, serde_json::json!({"a": true}));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.try_recv().unwrap() {
            GraphEvent::ToolEnd { result, .. } => assert!(!result.is_error),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_args_accepted() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("echo"));
        let node = ToolExecutorNode::new(Arc::new(registry));

        let mut state = ConversationState::new("q");
        state
            .set_tool_calls(&[ToolCall::new("c1", "echo", ToolArgs::new())])
            .unwrap();
        node.run(&CancellationToken::new(), &mut state).await.unwrap();
        assert_eq!(tool_turns(&state)[0].content, "{}");
    }
}
