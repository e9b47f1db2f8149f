//! Question answering over library papers.
//!
//! The analysis service indexes every paper it has analyzed. A chat request
//! names the papers to ground the answer in; with no context ids the service
//! searches the whole index.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One question for the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub uid: Option<String>,
    pub message: String,
    pub context_ids: Vec<String>,
}

impl ChatRequest {
    /// The JSON body sent to the chat endpoint
    ///
    /// An empty context is sent as `null`.
    pub fn to_payload(&self) -> Value {
        let context_ids = if self.context_ids.is_empty() {
            Value::Null
        } else {
            json!(self.context_ids)
        };
        let mut payload = json!({
            "message": self.message,
            "context_ids": context_ids,
        });
        if let Some(uid) = &self.uid {
            payload["uid"] = json!(uid);
        }
        payload
    }
}

/// A passage the answer was drawn from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSource {
    pub title: String,
    pub doc_id: String,
    pub chunk_type: String,
    #[serde(alias = "paperTitle", skip_serializing_if = "Option::is_none")]
    pub paper_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<ChatSource>,
}

impl ChatReply {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}
