use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgoraError {
    // Traversal errors
    #[error("Execution cancelled")]
    Cancelled,

    #[error("Graph exceeded max steps ({0})")]
    MaxStepsExceeded(usize),

    #[error("Node '{0}' not found in graph")]
    NodeNotFound(String),

    #[error("Node '{node}' failed: {source}")]
    NodeExecution {
        node: String,
        #[source]
        source: Box<AgoraError>,
    },

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    // Fan-out errors
    #[error("Failed to copy state for parallel execution: {0}")]
    StateCopy(String),

    #[error("Parallel branch {index} failed: {source}")]
    Branch {
        index: usize,
        #[source]
        source: Box<AgoraError>,
    },

    #[error("Parallel branch {index} panicked: {message}")]
    BranchPanicked { index: usize, message: String },

    // State errors
    #[error("State error: {0}")]
    State(String),

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM returned no choices")]
    EmptyResponse,

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgoraError {
    /// Wrap an error with the name of the node that produced it.
    pub fn in_node(node: impl Into<String>, source: AgoraError) -> Self {
        Self::NodeExecution {
            node: node.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, with node and branch wrappers removed.
    pub fn root_cause(&self) -> &AgoraError {
        let mut current = self;
        loop {
            match current {
                Self::NodeExecution { source, .. } | Self::Branch { source, .. } => {
                    current = source;
                }
                other => return other,
            }
        }
    }

    /// Whether this error is (or wraps) a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled)
    }

    /// Names of the nodes the error passed through, outermost first.
    ///
    /// For a failure inside a sub-graph this yields the sub-graph node
    /// followed by the failing node of the nested graph.
    pub fn failing_nodes(&self) -> Vec<&str> {
        let mut nodes = Vec::new();
        let mut current = self;
        loop {
            match current {
                Self::NodeExecution { node, source } => {
                    nodes.push(node.as_str());
                    current = source;
                }
                Self::Branch { source, .. } => current = source,
                _ => return nodes,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AgoraError>;
