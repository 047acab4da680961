//! Answer extraction from raw upstream replies

use log::{debug, error};
use serde_json::Value;

use crate::client::UpstreamReply;
use crate::config::ExtractionPolicy;
use crate::error::Error;
use crate::providers;
use crate::ProviderShape;

/// Sentinel answer for a successful reply with nothing at the answer path
pub const NO_ANSWER: &str = "(no answer)";

/// One step of a path into a JSON tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment
{   Key(&'static str)
  , Index(usize)
}

/// Follow `path` into `value`; `None` as soon as any step is missing
pub fn lookup<'a>(
  value: &'a Value
, path: &[Segment]
) -> Option<&'a Value>
{   path.iter().try_fold(value, |node, segment| match segment
    {   Segment::Key(key) => node.get(*key)
      , Segment::Index(i) => node.get(*i)
    })
}

/// Turn an upstream reply into the trimmed answer string
pub fn extract_answer(
  shape: ProviderShape
, reply: &UpstreamReply
, policy: ExtractionPolicy
) -> Result<String, Error>
{   if !reply.is_success()
    {   error!("Upstream error status {}", reply.status);
        return Err(Error::UpstreamStatus
        {   status: reply.status
          , raw: reply.body.clone()
        });
    }

    let data: Value = serde_json::from_str(&reply.body).map_err(|e| {
      error!("Upstream body is not JSON: {}", e);
      Error::BadUpstreamResponse { raw: reply.body.clone() }
    })?;

    let answer = lookup(&data, providers::answer_path(shape))
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|s| !s.is_empty());

    match (answer, policy)
    {   (Some(answer), _) => Ok(answer.to_string())
      , (None, ExtractionPolicy::Sentinel) => {
          debug!("No answer at {:?} path, using sentinel", shape);
          Ok(NO_ANSWER.to_string())
        }
      , (None, ExtractionPolicy::Strict) => {
          error!("No answer at {:?} path", shape);
          Err(Error::NoAnswerInResponse { raw: reply.body.clone() })
        }
    }
}
