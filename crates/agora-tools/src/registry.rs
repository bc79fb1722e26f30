use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use agora_core::error::{AgoraError, Result};
use agora_core::traits::Tool;
use agora_core::types::{ToolArgs, ToolDefinition};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Registry of available tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    default_timeout_secs: u64,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the timeout applied to tools that do not declare their own.
    pub fn with_default_timeout(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    /// Register a tool. A tool already registered under the same name is replaced.
    pub fn register(&mut self, tool: impl Tool) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Register several tools at once.
    pub fn register_all(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register_arc(tool);
        }
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Tool definitions for sending to the LLM, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Timeout in effect for the given tool.
    pub fn timeout_for(&self, tool: &dyn Tool) -> Duration {
        Duration::from_secs(tool.timeout_secs().unwrap_or(self.default_timeout_secs))
    }

    /// Execute a tool by name.
    ///
    /// Fails with `ToolNotFound` for unknown names, `ToolTimeout` when the
    /// tool overruns its timeout, and `Cancelled` when `cancel` fires first.
    pub async fn execute(
        &self,
        name: &str,
        args: ToolArgs,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgoraError::ToolNotFound(name.to_string()))?;

        let timeout = self.timeout_for(tool.as_ref());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgoraError::Cancelled),
            result = tokio::time::timeout(timeout, tool.execute(cancel.clone(), args)) => {
                match result {
                    Ok(result) => result,
                    Err(_) => Err(AgoraError::ToolTimeout {
                        tool: name.to_string(),
                        timeout_secs: timeout.as_secs(),
                    }),
                }
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
