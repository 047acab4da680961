//! Configuration for the relay and the HTTP server

use std::fmt;
use std::net::SocketAddr;
use serde::{Deserialize, Serialize};
use log::debug;

use crate::error::Error;
use crate::ProviderShape;

const GEMINI_GENERATE_URL: &str
  = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
const GEMINI_OPENAI_URL: &str
  = "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
const OPENROUTER_URL: &str
  = "https://openrouter.ai/api/v1/chat/completions";
const OPENAI_URL: &str
  = "https://api.openai.com/v1/chat/completions";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Where the upstream API key comes from
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential
{   /// Read from this environment variable on every request
    Env(String)
  , /// Fixed value (or none at all) reported under `name`
    Static
    {   name: String
      , #[serde(skip_serializing)]
        key: Option<String>
    }
}

impl Credential
{   /// Name the credential is reported under in errors
    pub fn name(&self) -> &str
    {   match self
        {   Credential::Env(var) => var
          , Credential::Static { name, .. } => name
        }
    }

    /// Current value; empty counts as absent
    pub fn peek(&self) -> Option<String>
    {   let key = match self
        {   Credential::Env(var) => std::env::var(var).ok()
          , Credential::Static { key, .. } => key.clone()
        };
        key.filter(|k| !k.is_empty())
    }

    /// Current value, or `MissingCredential`
    pub fn resolve(&self) -> Result<String, Error>
    {   self.peek().ok_or_else(|| {
          Error::MissingCredential(self.name().to_string())
        })
    }
}

// Keys never reach the logs
impl fmt::Debug for Credential
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   match self
        {   Credential::Env(var) => {
              f.debug_tuple("Env").field(var).finish()
            }
          , Credential::Static { name, key } => {
              f.debug_struct("Static")
                .field("name", name)
                .field("key", &key.as_ref().map(|_| "<redacted>"))
                .finish()
            }
        }
    }
}

/// How the API key is attached to the outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPlacement
{   /// `Authorization: Bearer <key>`
    Bearer
  , /// `?key=<key>` on the endpoint URL
    Query
}

/// What to do when a successful upstream reply has no answer at the
/// provider's answer path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy
{   /// Answer with the `(no answer)` sentinel
    Sentinel
  , /// Report `NoAnswerInResponse`
    Strict
}

impl Default for ExtractionPolicy
{   fn default() -> Self
    {   ExtractionPolicy::Sentinel
    }
}

/// Sampling parameters sent upstream; `None` fields are omitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig
{   pub temperature: Option<f32>
  , pub top_k: Option<u32>
  , pub top_p: Option<f32>
  , pub max_output_tokens: Option<u32>
}

impl Default for GenerationConfig
{   fn default() -> Self
    {   GenerationConfig
        {   temperature: Some(0.0)
          , top_k: Some(1)
          , top_p: Some(1.0)
          , max_output_tokens: Some(1024)
        }
    }
}

/// Relay configuration, fixed at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig
{   /// Wire format of the upstream API
    pub provider: ProviderShape
  , /// Full URL the prompt is POSTed to
    pub endpoint_url: String
  , /// Model name (chat shape only; Gemini carries it in the URL)
    pub model: Option<String>
  , /// Upstream API key source
    pub credential: Credential
  , /// Overrides the provider's default key placement
    pub credential_placement: Option<CredentialPlacement>
  , /// Sampling parameters
    pub generation: GenerationConfig
  , /// Optional system message (chat shape only)
    pub system_prompt: Option<String>
  , /// Outbound request timeout in seconds
    pub timeout_secs: u64
  , /// Missing-answer policy
    pub extraction: ExtractionPolicy
  , /// Largest inbound body accepted, in bytes
    pub body_limit_bytes: usize
  , /// OpenRouter attribution headers
    pub referer: Option<String>
  , pub title: Option<String>
}

impl Default for RelayConfig
{   fn default() -> Self
    {   RelayConfig
        {   provider: ProviderShape::Gemini
          , endpoint_url: GEMINI_GENERATE_URL.to_string()
          , model: None
          , credential: Credential::Env("GOOGLE_API_KEY".to_string())
          , credential_placement: None
          , generation: GenerationConfig::default()
          , system_prompt: None
          , timeout_secs: 30
          , extraction: ExtractionPolicy::default()
          , body_limit_bytes: 1024 * 1024
          , referer: None
          , title: None
        }
    }
}

impl RelayConfig
{   /// Configuration for one of the known providers:
    /// `gemini`, `gemini-openai`, `openrouter` or `openai`
    pub fn preset(name: &str) -> Result<Self, Error>
    {   debug!("Loading provider preset: {}", name);
        let base = RelayConfig::default();
        match name.trim().to_ascii_lowercase().as_str()
        {   "gemini" => Ok(base)
          , "gemini-openai" => Ok(RelayConfig
            {   provider: ProviderShape::Chat
              , endpoint_url: GEMINI_OPENAI_URL.to_string()
              , model: Some("gemini-2.0-flash".to_string())
              , credential_placement: Some(CredentialPlacement::Query)
              , ..base
            })
          , "openrouter" => Ok(RelayConfig
            {   provider: ProviderShape::Chat
              , endpoint_url: OPENROUTER_URL.to_string()
              , model: Some("openai/gpt-4o-mini".to_string())
              , credential: Credential::Env(
                  "OPENROUTER_API_KEY".to_string()
                )
              , ..base
            })
          , "openai" => Ok(RelayConfig
            {   provider: ProviderShape::Chat
              , endpoint_url: OPENAI_URL.to_string()
              , model: Some("gpt-4o-mini".to_string())
              , credential: Credential::Env(
                  "OPEN_API_KEY".to_string()
                )
              , ..base
            })
          , other => Err(Error::InvalidConfiguration(
              format!("unknown provider: {}", other)
            ))
        }
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: &str) -> Result<Self, Error>
    {   debug!("Loading relay config from {}", path);
        let text = std::fs::read_to_string(path).map_err(|e| {
          Error::InvalidConfiguration(format!("{}: {}", path, e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
          Error::InvalidConfiguration(format!("{}: {}", path, e))
        })
    }

    /// Build from the process environment.
    ///
    /// Starts from `QUIZ_RELAY_CONFIG` (a JSON file) when set, otherwise
    /// from the `QUIZ_RELAY_PROVIDER` preset (default `gemini`), then
    /// applies the individual `QUIZ_RELAY_*` overrides.
    pub fn from_env() -> Result<Self, Error>
    {   let mut config = match env_opt("QUIZ_RELAY_CONFIG")
        {   Some(path) => RelayConfig::from_json_file(&path)?
          , None => RelayConfig::preset(
              &env_opt("QUIZ_RELAY_PROVIDER")
                .unwrap_or_else(|| "gemini".to_string())
            )?
        };

        if let Some(url) = env_opt("QUIZ_RELAY_ENDPOINT")
        {   config.endpoint_url = url;
        }
        if let Some(model) = env_opt("QUIZ_RELAY_MODEL")
        {   config.model = Some(model);
        }
        if let Some(var) = env_opt("QUIZ_RELAY_KEY_VAR")
        {   config.credential = Credential::Env(var);
        }
        if let Some(secs) = env_parse::<u64>("QUIZ_RELAY_TIMEOUT_SECS")?
        {   config.timeout_secs = secs;
        }
        if let Some(t) = env_parse::<f32>("QUIZ_RELAY_TEMPERATURE")?
        {   config.generation.temperature = Some(t);
        }
        if let Some(n) = env_parse::<u32>("QUIZ_RELAY_MAX_TOKENS")?
        {   config.generation.max_output_tokens = Some(n);
        }
        if let Some(strict) = env_parse::<bool>("QUIZ_RELAY_STRICT")?
        {   config.extraction = if strict
            {   ExtractionPolicy::Strict
            } else
            {   ExtractionPolicy::Sentinel
            };
        }
        if let Some(prompt) = env_opt("QUIZ_RELAY_SYSTEM_PROMPT")
        {   config.system_prompt = Some(prompt);
        }
        if let Some(referer) = env_opt("QUIZ_RELAY_REFERER")
        {   config.referer = Some(referer);
        }
        if let Some(title) = env_opt("QUIZ_RELAY_TITLE")
        {   config.title = Some(title);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot run with
    pub fn validate(&self) -> Result<(), Error>
    {   if !self.endpoint_url.starts_with("http://")
          && !self.endpoint_url.starts_with("https://")
        {   return Err(Error::InvalidConfiguration(format!(
              "endpoint_url must be an http(s) URL: {}",
              self.endpoint_url
            )));
        }
        if self.provider == ProviderShape::Chat
          && self.model.as_deref().map_or(true, str::is_empty)
        {   return Err(Error::InvalidConfiguration(
              "chat provider requires a model".to_string()
            ));
        }
        if self.timeout_secs == 0
        {   return Err(Error::InvalidConfiguration(
              "timeout_secs must be positive".to_string()
            ));
        }
        if self.credential.name().is_empty()
        {   return Err(Error::InvalidConfiguration(
              "credential name is empty".to_string()
            ));
        }
        Ok(())
    }

    /// Key placement in effect for this provider
    pub fn placement(&self) -> CredentialPlacement
    {   self.credential_placement.unwrap_or(match self.provider
        {   ProviderShape::Gemini => CredentialPlacement::Query
          , ProviderShape::Chat => CredentialPlacement::Bearer
        })
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig
{   pub listen_address: SocketAddr
}

impl ServerConfig
{   /// Reads `QUIZ_RELAY_ADDR`, default `0.0.0.0:3000`
    pub fn from_env() -> Result<Self, Error>
    {   let raw = env_opt("QUIZ_RELAY_ADDR")
          .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_address = raw.parse().map_err(|_| {
          Error::InvalidConfiguration(
            format!("QUIZ_RELAY_ADDR is not a socket address: {}", raw)
          )
        })?;
        Ok(ServerConfig { listen_address })
    }
}

fn env_opt(name: &str) -> Option<String>
{   std::env::var(name).ok()
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str)
  -> Result<Option<T>, Error>
{   match env_opt(name)
    {   None => Ok(None)
      , Some(raw) => raw.parse().map(Some).map_err(|_| {
          Error::InvalidConfiguration(
            format!("{} has an invalid value: {}", name, raw)
          )
        })
    }
}
