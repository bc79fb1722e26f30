use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use agora_core::config::GraphConfig;
use agora_core::error::{AgoraError, Result};
use agora_core::event::EventBus;
use agora_core::traits::State;
use agora_core::types::{GraphEvent, RunId};

use super::edge::{Condition, EdgeTable, RouterFn};
use super::node::{is_terminal, node_fn, Next, Node, END};

const DEFAULT_MAX_STEPS: usize = 25;

/// Record of one completed node invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResult {
    /// Which node was executed.
    pub node_id: String,
    /// 1-based position in the traversal.
    pub step: usize,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of a successful graph execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult<S> {
    pub run_id: RunId,
    /// The final state.
    pub state: S,
    /// Per-node records in execution order.
    pub node_results: Vec<NodeResult>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

impl<S> ExecutionResult<S> {
    /// Number of node invocations.
    pub fn steps(&self) -> usize {
        self.node_results.len()
    }

    /// Names of the executed nodes, in order.
    pub fn path(&self) -> Vec<&str> {
        self.node_results.iter().map(|r| r.node_id.as_str()).collect()
    }
}

/// A failed graph execution.
///
/// Carries the state as it stood when the failure occurred, including any
/// changes the failing node made before returning its error.
#[derive(Debug)]
pub struct ExecutionFailure<S> {
    pub run_id: RunId,
    pub error: AgoraError,
    pub state: S,
    /// Records of the nodes that completed before the failure.
    pub node_results: Vec<NodeResult>,
}

impl<S> fmt::Display for ExecutionFailure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Graph execution failed: {}", self.error)
    }
}

impl<S: fmt::Debug> std::error::Error for ExecutionFailure<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<S> From<ExecutionFailure<S>> for AgoraError {
    fn from(failure: ExecutionFailure<S>) -> Self {
        failure.error
    }
}

/// A state machine over named nodes.
///
/// Starting from the entry node, the graph runs one node per step against a
/// single working state. After each node it picks the successor: an explicit
/// `Next::Goto` or `Next::End` from the node wins, then the node's routing
/// function, then its static edge. A node with none of these ends the run.
pub struct Graph<S: State> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: EdgeTable<S>,
    entry: Option<String>,
    max_steps: usize,
    event_bus: Option<Arc<EventBus>>,
}

impl<S: State> Graph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: EdgeTable::new(),
            entry: None,
            max_steps: DEFAULT_MAX_STEPS,
            event_bus: None,
        }
    }

    /// Publish lifecycle events for every execution to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Register a node. Registering an existing name replaces that node.
    pub fn add_node(&mut self, name: impl Into<String>, node: impl Node<S>) -> Result<()> {
        let name = name.into();
        if is_terminal(&name) {
            return Err(AgoraError::InvalidGraph(format!(
                "'{}' is reserved and cannot name a node",
                name
            )));
        }
        if self.nodes.insert(name.clone(), Arc::new(node)).is_some() {
            debug!(node_id = %name, "Replaced previously registered node");
        }
        Ok(())
    }

    /// Register a closure as a node.
    pub fn add_node_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: for<'a> Fn(&'a CancellationToken, &'a mut S) -> BoxFuture<'a, Result<Next>>
            + Send
            + Sync
            + 'static,
    {
        self.add_node(name, node_fn(f))
    }

    /// Set the static successor of `from`. Use `END` to stop after it.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let (from, to) = (from.into(), to.into());
        if let Some(previous) = self.edges.add_edge(from.clone(), to.clone()) {
            debug!(from = %from, previous = %previous, to = %to, "Replaced static edge");
        }
    }

    /// Attach a routing function to `from`.
    pub fn add_conditional_edge<F>(&mut self, from: impl Into<String>, router: F)
    where
        F: Fn(&S) -> Next + Send + Sync + 'static,
    {
        let router: RouterFn<S> = Arc::new(router);
        let from = from.into();
        if self.edges.add_router(from.clone(), router) {
            debug!(from = %from, "Replaced routing function");
        }
    }

    /// Route `from` to `if_true` or `if_false` depending on an expression
    /// such as `status == "done"`. See [`Condition`] for the supported forms.
    pub fn add_branch(
        &mut self,
        from: impl Into<String>,
        expr: &str,
        if_true: impl Into<String>,
        if_false: impl Into<String>,
    ) -> Result<()> {
        let condition = Condition::parse(expr).ok_or_else(|| {
            AgoraError::InvalidGraph(format!("unsupported branch expression: {}", expr))
        })?;
        let (if_true, if_false) = (if_true.into(), if_false.into());
        self.add_conditional_edge(from, move |state: &S| {
            if condition.evaluate(state) {
                Next::Goto(if_true.clone())
            } else {
                Next::Goto(if_false.clone())
            }
        });
        Ok(())
    }

    pub fn set_entry(&mut self, name: impl Into<String>) {
        self.entry = Some(name.into());
    }

    /// Set the step budget. Values below 1 are raised to 1.
    pub fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps.max(1);
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Registered node names, sorted.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Take the entry node (when set) and step budget from config.
    pub fn apply_config(&mut self, config: &GraphConfig) {
        if let Some(entry) = &config.entry {
            self.set_entry(entry.clone());
        }
        self.set_max_steps(config.max_steps);
    }

    /// Check the wiring without running anything.
    pub fn validate(&self) -> Result<()> {
        self.entry_node()?;

        for (from, to) in self.edges.edges() {
            if !self.contains_node(from) {
                return Err(AgoraError::InvalidGraph(format!(
                    "edge source '{}' is not a registered node",
                    from
                )));
            }
            if !is_terminal(to) && !self.contains_node(to) {
                return Err(AgoraError::InvalidGraph(format!(
                    "edge '{}' -> '{}' targets an unregistered node",
                    from, to
                )));
            }
        }

        for from in self.edges.router_sources() {
            if !self.contains_node(from) {
                return Err(AgoraError::InvalidGraph(format!(
                    "routing function source '{}' is not a registered node",
                    from
                )));
            }
        }

        Ok(())
    }

    fn entry_node(&self) -> Result<&str> {
        let entry = self
            .entry
            .as_deref()
            .ok_or_else(|| AgoraError::InvalidGraph("no entry node set".into()))?;
        if !self.contains_node(entry) {
            return Err(AgoraError::InvalidGraph(format!(
                "entry node '{}' is not registered",
                entry
            )));
        }
        Ok(entry)
    }

    fn publish(&self, event: GraphEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run the graph from the entry node until it reaches the terminal state.
    ///
    /// On failure the returned [`ExecutionFailure`] still owns the state, as
    /// it stood when the error occurred.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        state: S,
    ) -> std::result::Result<ExecutionResult<S>, ExecutionFailure<S>> {
        let run_id = RunId::new();
        let mut state = state;
        let mut node_results = Vec::new();

        let (outcome, total_elapsed_ms) = self
            .run_tracked(&run_id, cancel, &mut state, &mut node_results)
            .await;

        match outcome {
            Ok(()) => Ok(ExecutionResult {
                run_id,
                state,
                node_results,
                total_elapsed_ms,
            }),
            Err(error) => Err(ExecutionFailure {
                run_id,
                error,
                state,
                node_results,
            }),
        }
    }

    /// Run this graph against a state owned by the caller, as a nested graph.
    ///
    /// Errors come back exactly as the nested traversal produced them.
    pub(crate) async fn run_nested(&self, cancel: &CancellationToken, state: &mut S) -> Result<()> {
        let run_id = RunId::new();
        let mut node_results = Vec::new();
        let (outcome, _) = self
            .run_tracked(&run_id, cancel, state, &mut node_results)
            .await;
        outcome
    }

    /// Drive one run and close its lifecycle: completion log plus
    /// `RunComplete` or `RunError` on the bus.
    async fn run_tracked(
        &self,
        run_id: &RunId,
        cancel: &CancellationToken,
        state: &mut S,
        node_results: &mut Vec<NodeResult>,
    ) -> (Result<()>, u64) {
        let start = Instant::now();
        let outcome = self.drive(run_id, cancel, state, node_results).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(()) => {
                info!(
                    run_id = %run_id,
                    steps = node_results.len(),
                    elapsed_ms,
                    "Graph execution complete"
                );
                self.publish(GraphEvent::RunComplete {
                    run_id: run_id.clone(),
                    steps: node_results.len(),
                    elapsed_ms,
                });
            }
            Err(error) => {
                if error.is_cancelled() {
                    warn!(run_id = %run_id, "Graph execution cancelled");
                } else {
                    error!(run_id = %run_id, error = %error, "Graph execution failed");
                }
                self.publish(GraphEvent::RunError {
                    run_id: run_id.clone(),
                    error: error.to_string(),
                });
            }
        }
        (outcome, elapsed_ms)
    }

    async fn drive(
        &self,
        run_id: &RunId,
        cancel: &CancellationToken,
        state: &mut S,
        node_results: &mut Vec<NodeResult>,
    ) -> Result<()> {
        let entry = self.entry_node()?;
        info!(run_id = %run_id, entry = %entry, max_steps = self.max_steps, "Starting graph execution");
        self.publish(GraphEvent::RunStarted {
            run_id: run_id.clone(),
            entry: entry.to_string(),
            started_at: chrono::Utc::now(),
        });

        let mut current = entry.to_string();
        let mut steps = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(AgoraError::Cancelled);
            }
            if steps >= self.max_steps {
                warn!(
                    run_id = %run_id,
                    node_id = %current,
                    max_steps = self.max_steps,
                    "Step budget exhausted, terminating graph"
                );
                return Err(AgoraError::MaxStepsExceeded(self.max_steps));
            }

            let node = self
                .nodes
                .get(&current)
                .cloned()
                .ok_or_else(|| AgoraError::NodeNotFound(current.clone()))?;

            steps += 1;
            info!(run_id = %run_id, node_id = %current, step = steps, "Executing graph node");
            self.publish(GraphEvent::NodeStarted {
                run_id: run_id.clone(),
                node_id: current.clone(),
                step: steps,
            });

            let node_start = Instant::now();
            let next = match node.run(cancel, state).await {
                Ok(next) => next,
                Err(e) => {
                    if !e.is_cancelled() {
                        error!(run_id = %run_id, node_id = %current, error = %e, "Graph node failed");
                    }
                    self.publish(GraphEvent::NodeFailed {
                        run_id: run_id.clone(),
                        node_id: current.clone(),
                        step: steps,
                        error: e.to_string(),
                    });
                    return Err(AgoraError::in_node(current, e));
                }
            };

            let elapsed_ms = node_start.elapsed().as_millis() as u64;
            node_results.push(NodeResult {
                node_id: current.clone(),
                step: steps,
                elapsed_ms,
            });
            self.publish(GraphEvent::NodeCompleted {
                run_id: run_id.clone(),
                node_id: current.clone(),
                step: steps,
                elapsed_ms,
            });

            match self.successor(&current, next, state) {
                Some(target) if !is_terminal(&target) => {
                    debug!(from = %current, to = %target, "Following transition");
                    current = target;
                }
                // Terminal transitions end the run before the next step's
                // cancellation and budget gates are consulted.
                _ => {
                    debug!(node_id = %current, "Reached {}, graph complete", END);
                    return Ok(());
                }
            }
        }
    }

    fn successor(&self, current: &str, next: Next, state: &S) -> Option<String> {
        match next {
            Next::End => None,
            Next::Goto(target) => Some(target),
            Next::Continue => self.edges.resolve(current, state),
        }
    }
}

impl<S: State> Default for Graph<S> {
    fn default() -> Self {
        Self::new()
    }
}
