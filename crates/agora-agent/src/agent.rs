use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use agora_core::config::AgentConfig;
use agora_core::error::{AgoraError, Result};
use agora_core::traits::{LlmClient, State};
use agora_core::types::{ChatMessage, ModelRequest, ToolChoice};
use agora_tools::ToolRegistry;

use crate::graph::{Next, Node};

/// The decision half of a tool-calling loop.
///
/// Sends the conversation, prefixed with a system turn carrying the
/// instructions, to the LLM and records the first candidate turn. A turn that
/// requests tools leaves those requests pending in the state and clears the
/// output; any other turn becomes the output.
pub struct AgentNode {
    llm: Arc<dyn LlmClient>,
    instructions: String,
    tools: Option<Arc<ToolRegistry>>,
    tool_choice: ToolChoice,
}

impl AgentNode {
    /// A plain conversational agent with no tools.
    pub fn new(llm: Arc<dyn LlmClient>, instructions: impl Into<String>) -> Self {
        Self {
            llm,
            instructions: instructions.into(),
            tools: None,
            tool_choice: ToolChoice::default(),
        }
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, config: &AgentConfig) -> Self {
        Self::new(llm, config.instructions.clone()).with_tool_choice(config.tool_choice.clone())
    }

    /// Offer the registry's tools to the model on every call.
    pub fn with_tools(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tools = Some(registry);
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    fn build_request(&self, history: Vec<ChatMessage>) -> ModelRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(self.instructions.clone()));
        messages.extend(history);

        match &self.tools {
            Some(registry) if !registry.is_empty() => ModelRequest {
                messages,
                tools: registry.definitions(),
                tool_choice: Some(self.tool_choice.clone()),
            },
            _ => ModelRequest {
                messages,
                ..ModelRequest::default()
            },
        }
    }

    async fn decide<S: State>(&self, cancel: &CancellationToken, state: &mut S) -> Result<()> {
        let request = self.build_request(state.to_chat_history()?);
        debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending LLM request"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgoraError::Cancelled),
            result = self.llm.invoke(cancel.clone(), request) => result?,
        };

        if let Some(usage) = response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "LLM usage"
            );
        }

        let turn = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(AgoraError::EmptyResponse)?;

        if turn.has_tool_calls() {
            let calls = turn.tool_calls.clone();
            info!(count = calls.len(), "Model requested tool calls");
            state.append_turn(turn)?;
            state.set_tool_calls(&calls)?;
            state.set_output("")?;
        } else {
            let text = turn.content.clone();
            state.append_turn(turn)?;
            state.set_tool_calls(&[])?;
            state.set_output(&text)?;
        }
        Ok(())
    }
}

impl<S: State> Node<S> for AgentNode {
    fn run<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        state: &'a mut S,
    ) -> BoxFuture<'a, Result<Next>> {
        Box::pin(async move {
            self.decide(cancel, state).await?;
            Ok(Next::Continue)
        })
    }
}

/// Routing function for the decision node of a tool-calling loop: go to
/// `tools_node` while tool calls are pending, otherwise end the run.
pub fn tool_router<S: State>(
    tools_node: impl Into<String>,
) -> impl Fn(&S) -> Next + Send + Sync + 'static {
    let tools_node = tools_node.into();
    move |state: &S| match state.tool_calls() {
        Ok(calls) if !calls.is_empty() => Next::Goto(tools_node.clone()),
        _ => Next::End,
    }
}
