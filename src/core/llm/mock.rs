use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{ChatMessage, LlmProvider, parse_structured_output};

/// One scripted answer, consumed in order.
#[derive(Debug, Clone)]
pub enum MockReply {
    Payload(Value),
    Text(String),
    Empty,
    Failure(String),
}

/// What a caller sent to the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub response_schema: Option<Value>,
}

/// Scripted in-process provider. Clones share the same queue and call log.
#[derive(Clone)]
pub struct MockProvider {
    id: String,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.push_reply(reply);
        self
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_reply(&self, call: RecordedCall) -> Result<MockReply> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left in mock provider '{}'", self.id))
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        let reply = self.next_reply(RecordedCall {
            model_id: model_id.to_string(),
            messages: messages.to_vec(),
            response_schema: None,
        })?;
        match reply {
            MockReply::Payload(v) => Ok(v.to_string()),
            MockReply::Text(t) => Ok(t),
            MockReply::Empty => Ok(String::new()),
            MockReply::Failure(msg) => Err(anyhow!(msg)),
        }
    }

    async fn generate_structured(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        response_schema: &Value,
    ) -> Result<Option<Value>> {
        let reply = self.next_reply(RecordedCall {
            model_id: model_id.to_string(),
            messages: messages.to_vec(),
            response_schema: Some(response_schema.clone()),
        })?;
        match reply {
            MockReply::Payload(v) => Ok(Some(v)),
            MockReply::Text(t) => parse_structured_output(&t),
            MockReply::Empty => Ok(None),
            MockReply::Failure(msg) => Err(anyhow!(msg)),
        }
    }
}
