//! Graph execution engine.
//!
//! A graph is a set of named `Node`s over one working state. Execution starts
//! at the entry node and moves one node per step, following explicit jumps
//! from the node itself, then routing functions, then static edges, until it
//! reaches `END`, runs out of successors, exhausts its step budget or is
//! cancelled.
//!
//! `ParallelNode` fans work out over copies of the state and merges the
//! results back; `SubGraphNode` runs a whole nested graph as one step.

pub mod edge;
pub mod executor;
pub mod node;
pub mod parallel;
pub mod subgraph;

pub use edge::{Condition, RouterFn};
pub use executor::{ExecutionFailure, ExecutionResult, Graph, NodeResult};
pub use node::{node_fn, FnNode, Next, Node, END};
pub use parallel::{MergeFn, ParallelNode};
pub use subgraph::SubGraphNode;
