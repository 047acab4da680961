use std::fmt;

/// Custom error type for relay operations
/// Implements Clone so tests can compare outcomes directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Relay route hit with something other than POST or OPTIONS
    MethodNotAllowed
  , /// Inbound body is not valid JSON (or could not be read)
    InvalidBody(String)
  , /// Inbound body exceeds the configured limit (bytes)
    BodyTooLarge(usize)
  , /// Required inbound field is absent or blank
    MissingField(&'static str)
  , /// Credential variable is absent or empty
    MissingCredential(String)
  , /// Outbound HTTP call failed before a reply arrived
    HttpError(String)
  , /// Upstream replied with a non-success status
    UpstreamStatus
    {   status: u16
      , raw: String
    }
  , /// Upstream replied with success but the body is not JSON
    BadUpstreamResponse
    {   raw: String
    }
  , /// Strict extraction found nothing at the answer path
    NoAnswerInResponse
    {   raw: String
    }
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Outbound call exceeded the configured timeout
    Timeout
}

impl Error
{   /// HTTP status this error is reported with
    pub fn status_code(&self) -> u16
    {   match self
        {   Error::MethodNotAllowed => 405
          , Error::InvalidBody(_)
          | Error::MissingField(_) => 400
          , Error::BodyTooLarge(_) => 413
          , Error::MissingCredential(_)
          | Error::HttpError(_)
          | Error::UpstreamStatus { .. }
          | Error::BadUpstreamResponse { .. }
          | Error::NoAnswerInResponse { .. }
          | Error::InvalidConfiguration(_)
          | Error::Timeout => 500
        }
    }

    /// Upstream body to echo back for diagnosis, when there is one
    pub fn raw(&self) -> Option<&str>
    {   match self
        {   Error::UpstreamStatus { raw, .. }
          | Error::BadUpstreamResponse { raw }
          | Error::NoAnswerInResponse { raw } => Some(raw)
          , _ => None
        }
    }

    /// Upstream status to echo back, when the upstream replied at all
    pub fn upstream_status(&self) -> Option<u16>
    {   match self
        {   Error::UpstreamStatus { status, .. } => Some(*status)
          , _ => None
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::MethodNotAllowed => {
              write!(f, "Method not allowed")
            }
          , Error::InvalidBody(msg) => {
              write!(f, "Invalid JSON body: {}", msg)
            }
          , Error::BodyTooLarge(limit) => {
              write!(f, "Request body is too large, limit is {} bytes", limit)
            }
          , Error::MissingField(field) => {
              write!(f, "No {} provided", field)
            }
          , Error::MissingCredential(name) => {
              write!(f, "Missing {}", name)
            }
          , Error::HttpError(msg) => {
              write!(f, "Upstream request failed: {}", msg)
            }
          , Error::UpstreamStatus { status, .. } => {
              write!(f, "Upstream returned status {}", status)
            }
          , Error::BadUpstreamResponse { .. } => {
              write!(f, "Invalid response from upstream")
            }
          , Error::NoAnswerInResponse { .. } => {
              write!(f, "Upstream response contained no answer")
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::Timeout => {
              write!(f, "Upstream request timed out")
            }
        }
    }
}

impl std::error::Error for Error {}

// The request URL can carry the API key, so it never reaches the message
impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   let e = e.without_url();
        if e.is_timeout()
        {   Error::Timeout
        } else
        {   Error::HttpError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::InvalidBody(e.to_string())
    }
}
