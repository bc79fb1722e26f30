use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use agora_core::error::{AgoraError, Result};
use agora_core::traits::LlmClient;
use agora_core::types::{ChatMessage, ModelRequest, ModelResponse, ToolArgs, ToolCall};

/// Scripted LLM: replays queued responses in order and records every request.
#[derive(Default)]
pub struct MockLlm {
    responses: Mutex<VecDeque<std::result::Result<ModelResponse, String>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full response.
    pub fn with_response(self, response: ModelResponse) -> Self {
        self.lock_responses().push_back(Ok(response));
        self
    }

    /// Queue a plain assistant reply.
    pub fn with_text(self, text: &str) -> Self {
        self.with_response(ModelResponse::from_message(ChatMessage::assistant_text(text)))
    }

    /// Queue an assistant turn requesting a single tool call.
    pub fn with_tool_call(self, id: &str, name: &str, args: ToolArgs) -> Self {
        let call = ToolCall::new(id, name, args);
        self.with_response(ModelResponse::from_message(
            ChatMessage::assistant_tool_calls("", vec![call]),
        ))
    }

    /// Queue a response with no candidate turns.
    pub fn with_empty_response(self) -> Self {
        self.with_response(ModelResponse::default())
    }

    /// Queue a backend failure.
    pub fn with_error(self, message: &str) -> Self {
        self.lock_responses().push_back(Err(message.to_string()));
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock poisoned").len()
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<std::result::Result<ModelResponse, String>>> {
        self.responses.lock().expect("responses lock poisoned")
    }
}

impl LlmClient for MockLlm {
    fn invoke(
        &self,
        _cancel: CancellationToken,
        request: ModelRequest,
    ) -> BoxFuture<'_, Result<ModelResponse>> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request);
        let next = self.lock_responses().pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(AgoraError::LlmRequest(message)),
                None => Err(AgoraError::LlmRequest("no scripted response left".into())),
            }
        })
    }
}
