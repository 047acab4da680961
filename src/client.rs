use std::time::Duration;
use log::{debug, trace, error, info};

use crate::config::{CredentialPlacement, RelayConfig};
use crate::error::Error;
use crate::extract::extract_answer;
use crate::prompt::compose;
use crate::providers::UpstreamRequest;
use crate::request::InboundPayload;

/// Raw upstream reply: status plus the body as text, not pre-parsed,
/// since providers sometimes send non-JSON error pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply
{   pub status: u16
  , pub body: String
}

impl UpstreamReply
{   pub fn is_success(&self) -> bool
    {   (200..300).contains(&self.status)
    }
}

/// Relay to one configured upstream provider.
/// Holds no per-request state; share it behind an `Arc`.
pub struct Relay
{   config: RelayConfig
  , http_client: reqwest::Client
}

impl Relay
{   /// Validate the configuration and build the HTTP client
    pub fn new(
      config: RelayConfig
    ) -> Result<Self, Error>
    {   config.validate()?;
        debug!(
          "Creating Relay for {:?} at {}",
          config.provider, config.endpoint_url
        );
        let http_client = reqwest::Client::builder()
          .timeout(Duration::from_secs(config.timeout_secs))
          .build()
          .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            Error::InvalidConfiguration(e.to_string())
          })?;
        info!(
          "Relay ready: {:?} provider, credential {}",
          config.provider, config.credential.name()
        );
        Ok(Relay
        {   config
          , http_client
        })
    }

    pub fn config(&self) -> &RelayConfig
    {   &self.config
    }

    /// Compose, send and extract: the whole relay for one payload
    pub async fn answer(
      &self
    , payload: &InboundPayload
    ) -> Result<String, Error>
    {   let prompt = compose(payload);
        let reply = self.send(&prompt).await?;
        extract_answer(
          self.config.provider
        , &reply
        , self.config.extraction
        )
    }

    /// POST `prompt` upstream exactly once.
    /// The credential is resolved before any network activity.
    pub async fn send(
      &self
    , prompt: &str
    ) -> Result<UpstreamReply, Error>
    {   let api_key = self.config.credential.resolve().map_err(|e| {
          error!("{}", e);
          e
        })?;

        let request = UpstreamRequest::build(&self.config, prompt);
        trace!("Upstream request: {:?}", request);

        let mut builder = self.http_client
          .post(&self.config.endpoint_url)
          .header("Content-Type", "application/json")
          .json(&request);

        builder = match self.config.placement()
        {   CredentialPlacement::Bearer => builder.bearer_auth(&api_key)
          , CredentialPlacement::Query => {
              builder.query(&[("key", api_key.as_str())])
            }
        };
        if let Some(referer) = &self.config.referer
        {   builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title
        {   builder = builder.header("X-Title", title);
        }

        let response = builder
          .send()
          .await
          .map_err(|e| {
            let e = e.without_url();
            error!("HTTP error: {}", e);
            Error::from(e)
          })?;

        let status = response.status().as_u16();
        trace!("Upstream response status: {}", status);

        let body = response.text().await.map_err(|e| {
          let e = e.without_url();
          error!("Failed to read upstream body: {}", e);
          Error::from(e)
        })?;
        debug!("Upstream replied {} with {} bytes", status, body.len());

        Ok(UpstreamReply
        {   status
          , body
        })
    }
}
