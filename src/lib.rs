pub mod error;
pub mod config;
pub mod providers;
pub mod request;
pub mod prompt;
pub mod extract;
pub mod client;
pub mod server;
use serde::{Deserialize, Serialize};

/*

quiz-relay: a small HTTP service that takes quiz text, wraps it in a fixed
answer-format prompt, forwards it to one LLM provider and relays the
answer back as JSON.

Per request, strictly in order:

  request::normalize  -> InboundPayload
  prompt::compose     -> prompt string
  client::Relay::send -> UpstreamReply (status + raw text)
  extract::extract_answer -> answer string

server.rs wires that pipeline behind axum routes; main.rs is the binary.

*/

pub use client::{Relay, UpstreamReply};
pub use config::{
  Credential, CredentialPlacement, ExtractionPolicy, GenerationConfig,
  RelayConfig, ServerConfig,
};
pub use error::Error;
pub use extract::NO_ANSWER;
pub use request::{InboundPayload, TransportBody};

/// RELAY STRUCTURES:

/// Wire format spoken by the upstream provider.
/// Chosen once at construction; never switched per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderShape
{
  /// Google `generateContent`: `contents[].parts[].text`
  Gemini
  ,
  /// OpenAI-compatible chat completions (OpenAI, OpenRouter,
  /// Gemini's OpenAI endpoint): `messages[]`
  Chat
}

/// Inbound body layout a route accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadShape
{
  /// `{ "text": ... }`, answered as `{ "output": ... }`
  Text
  ,
  /// `{ "question", "instruction"?, "choices": [...] }`,
  /// answered as `{ "answer": ... }`
  Question
}

impl PayloadShape
{   /// Field name the answer is returned under
    pub fn answer_field(&self) -> &'static str
    {   match self
        {   PayloadShape::Text => "output"
          , PayloadShape::Question => "answer"
        }
    }
}
