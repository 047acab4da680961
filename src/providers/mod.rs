//! Provider wire formats

pub mod gemini;
pub mod chat;

use serde::Serialize;

use crate::config::RelayConfig;
use crate::extract::Segment;
use crate::ProviderShape;

pub use chat::{ChatMessage, ChatRequest};
pub use gemini::GenerateContentRequest;

/// Outbound body for whichever provider shape is configured
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UpstreamRequest
{   Gemini(GenerateContentRequest)
  , Chat(ChatRequest)
}

impl UpstreamRequest
{   /// Wrap `prompt` in the configured provider's request body
    pub fn build(config: &RelayConfig, prompt: &str) -> Self
    {   match config.provider
        {   ProviderShape::Gemini => UpstreamRequest::Gemini(
              GenerateContentRequest::new(prompt, &config.generation)
            )
          , ProviderShape::Chat => UpstreamRequest::Chat(
              ChatRequest::new(prompt, config)
            )
        }
    }
}

/// Where the answer text sits in a successful reply
pub fn answer_path(shape: ProviderShape) -> &'static [Segment]
{   match shape
    {   ProviderShape::Gemini => gemini::ANSWER_PATH
      , ProviderShape::Chat => chat::ANSWER_PATH
    }
}
