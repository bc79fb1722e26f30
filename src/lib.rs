//! Agora: a graph execution engine for stateful, tool-using agents.
//!
//! A [`Graph`] runs named nodes one step at a time over a shared [`State`],
//! with a step budget and cooperative cancellation. [`ParallelNode`] and
//! [`SubGraphNode`] compose graphs; [`AgentNode`] and [`ToolExecutorNode`]
//! form the decide/act loop of a tool-calling agent.
//!
//! ```ignore
//! let registry = Arc::new(registry);
//! let mut graph = Graph::<ConversationState>::new();
//! graph.add_node("agent", AgentNode::new(llm, "You are a helpful assistant.").with_tools(registry.clone()))?;
//! graph.add_node("tools", ToolExecutorNode::new(registry))?;
//! graph.add_conditional_edge("agent", tool_router("tools"));
//! graph.add_edge("tools", "agent");
//! graph.set_entry("agent");
//!
//! let result = graph.execute(&CancellationToken::new(), ConversationState::new("hi")).await?;
//! println!("{}", result.state.output().unwrap_or_default());
//! ```

pub use agora_agent::{
    graph, node_fn, tool_router, AgentNode, Condition, ExecutionFailure, ExecutionResult, FnNode,
    Graph, Next, Node, NodeResult, ParallelNode, SubGraphNode, ToolExecutorNode, END,
};
pub use agora_core::{
    config, error, event, state, traits, types, AgoraConfig, AgoraError, ConversationState,
    EventBus, LlmClient, Result, State, Tool,
};
pub use agora_core::types::*;
pub use agora_tools::ToolRegistry;
