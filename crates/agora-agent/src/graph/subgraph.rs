use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use agora_core::error::Result;
use agora_core::traits::State;

use super::executor::Graph;
use super::node::{Next, Node};

/// Runs a nested graph as a single step of an enclosing graph.
///
/// The nested graph works directly on the enclosing graph's state and uses
/// its own entry node and step budget. Its errors are returned as-is; the
/// enclosing graph then attributes them to this node.
pub struct SubGraphNode<S: State> {
    graph: Arc<Graph<S>>,
}

impl<S: State> SubGraphNode<S> {
    pub fn new(graph: Graph<S>) -> Self {
        Self {
            graph: Arc::new(graph),
        }
    }

    /// Share one nested graph between several nodes.
    pub fn from_shared(graph: Arc<Graph<S>>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Graph<S> {
        &self.graph
    }
}

impl<S: State> Node<S> for SubGraphNode<S> {
    fn run<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        state: &'a mut S,
    ) -> BoxFuture<'a, Result<Next>> {
        Box::pin(async move {
            debug!(entry = ?self.graph.entry(), "Entering sub-graph");
            self.graph.run_nested(cancel, state).await?;
            Ok(Next::Continue)
        })
    }
}
