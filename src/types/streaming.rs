//! The unified increment type for streamed responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One increment of a streamed response.
///
/// A chunk with `finished == true` is terminal: no further chunks are
/// produced for that stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    pub content: String,
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl StreamChunk {
    /// A non-terminal chunk carrying incremental text.
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// The terminal chunk for a stream, with no content of its own.
    pub fn terminal() -> Self {
        Self {
            finished: true,
            ..Self::default()
        }
    }

    pub fn with_finished(mut self, finished: bool) -> Self {
        self.finished = finished;
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<Value>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
