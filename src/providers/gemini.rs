//! Google `generateContent` request format

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::extract::Segment;

/// `candidates[0].content.parts[0].text`
pub const ANSWER_PATH: &[Segment] = &[
  Segment::Key("candidates")
, Segment::Index(0)
, Segment::Key("content")
, Segment::Key("parts")
, Segment::Index(0)
, Segment::Key("text")
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest
{   pub contents: Vec<Content>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content
{   #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>
  , pub parts: Vec<Part>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part
{   pub text: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig
{   #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>
}

impl GenerateContentRequest
{   /// Single user turn carrying the prompt
    pub fn new(prompt: &str, generation: &GenerationConfig) -> Self
    {   GenerateContentRequest
        {   contents: vec![
              Content
              {   role: Some("user".to_string())
                , parts: vec![Part { text: prompt.to_string() }]
              }
            ]
          , generation_config: generation_config(generation)
        }
    }
}

// Omitted entirely when nothing is set
fn generation_config(g: &GenerationConfig)
  -> Option<GeminiGenerationConfig>
{   if g.temperature.is_none()
      && g.top_k.is_none()
      && g.top_p.is_none()
      && g.max_output_tokens.is_none()
    {   return None;
    }
    Some(GeminiGenerationConfig
    {   temperature: g.temperature
      , top_k: g.top_k
      , top_p: g.top_p
      , max_output_tokens: g.max_output_tokens
    })
}
