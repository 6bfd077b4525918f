//! Scripted agent for tests

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::{AgentError, ChatAgent, ChatFuture, ChatReply, ChatRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Agent that replays queued results and records every request
///
/// With an empty queue it answers `AgentError::RequestFailed`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedAgent {
    replies: Arc<Mutex<VecDeque<Result<ChatReply, AgentError>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedAgent {
    /// Agent with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    #[must_use]
    pub fn reply(self, conversation_id: Option<&str>, response: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(ChatReply {
            conversation_id: conversation_id.map(str::to_string),
            response: response.to_string(),
        }));
        self
    }

    /// Queue a failure
    #[must_use]
    pub fn fail(self, error: AgentError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatAgent for ScriptedAgent {
    fn send(&self, request: ChatRequest) -> ChatFuture<'_> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::RequestFailed("no scripted reply".into())));
        Box::pin(async move { next })
    }
}
