//! OpenAI-compatible chat-completions request format

use serde::{Deserialize, Serialize};

use crate::config::RelayConfig;
use crate::extract::Segment;

/// `choices[0].message.content`
pub const ANSWER_PATH: &[Segment] = &[
  Segment::Key("choices")
, Segment::Index(0)
, Segment::Key("message")
, Segment::Key("content")
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , pub content: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>
}

impl ChatRequest
{   /// Optional system turn, then the prompt as the user turn
    pub fn new(prompt: &str, config: &RelayConfig) -> Self
    {   let mut messages = Vec::with_capacity(2);
        if let Some(system) = &config.system_prompt
        {   messages.push(ChatMessage
            {   role: "system".to_string()
              , content: system.clone()
            });
        }
        messages.push(ChatMessage
        {   role: "user".to_string()
          , content: prompt.to_string()
        });

        ChatRequest
        {   model: config.model.clone().unwrap_or_default()
          , messages
          , temperature: config.generation.temperature
          , max_tokens: config.generation.max_output_tokens
          , stream: Some(false)
        }
    }
}
