pub mod agent;
pub mod graph;
pub mod tool_executor;

pub use agent::{tool_router, AgentNode};
pub use graph::{
    node_fn, Condition, ExecutionFailure, ExecutionResult, FnNode, Graph, Next, Node, NodeResult,
    ParallelNode, SubGraphNode, END,
};
pub use tool_executor::ToolExecutorNode;
