//! Inbound request types and body normalization

use http_body_util::{BodyExt, LengthLimitError, Limited};
use log::{debug, trace};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::PayloadShape;

/// Inbound body as the transport handed it over
#[derive(Debug)]
pub enum TransportBody
{   /// Already parsed by an earlier layer; used as-is
    Parsed(Value)
  , /// Text that still needs JSON parsing
    Raw(String)
  , /// Byte stream nobody has read yet
    Unread(axum::body::Body)
}

/// Normalized inbound payload, one per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload
{   /// Free-form quiz text; the model works out the question type
    Text
    {   text: String
    }
  , /// Explicit question with a numbered choice list
    Question
    {   question: String
      , instruction: Option<String>
      , choices: Vec<String>
    }
}

impl InboundPayload
{   pub fn shape(&self) -> PayloadShape
    {   match self
        {   InboundPayload::Text { .. } => PayloadShape::Text
          , InboundPayload::Question { .. } => PayloadShape::Question
        }
    }
}

/// Answer returned to the caller, keyed by the route's answer field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult
{   pub shape: PayloadShape
  , pub answer: String
}

impl AnswerResult
{   /// `{ "output": ... }` or `{ "answer": ... }`
    pub fn to_json(&self) -> Value
    {   let mut body = Map::new();
        body.insert(
          self.shape.answer_field().to_string()
        , Value::String(self.answer.clone())
        );
        Value::Object(body)
    }
}

/// Turn whatever the transport delivered into an `InboundPayload`
pub async fn normalize(
  body: TransportBody
, shape: PayloadShape
, limit: usize
) -> Result<InboundPayload, Error>
{   let value = read_body(body, limit).await?;
    payload_from_value(&value, shape)
}

/// Resolve the body to a JSON value. Only `Unread` touches a stream.
pub async fn read_body(
  body: TransportBody
, limit: usize
) -> Result<Value, Error>
{   match body
    {   TransportBody::Parsed(Value::String(text)) => {
          trace!("Body arrived as a JSON string, parsing its contents");
          parse_text(&text)
        }
      , TransportBody::Parsed(value) => Ok(value)
      , TransportBody::Raw(text) => parse_text(&text)
      , TransportBody::Unread(stream) => {
          let bytes = Limited::new(stream, limit)
            .collect()
            .await
            .map_err(|e| {
              if e.is::<LengthLimitError>()
              {   Error::BodyTooLarge(limit)
              } else
              {   Error::InvalidBody(e.to_string())
              }
            })?
            .to_bytes();
          debug!("Read {} body bytes from stream", bytes.len());
          let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::InvalidBody(e.to_string()))?;
          parse_text(&text)
        }
    }
}

/// Parse body text; empty text is an empty object
pub fn parse_text(text: &str) -> Result<Value, Error>
{   if text.trim().is_empty()
    {   return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_str(text)?)
}

/// Pull the recognized fields out of a parsed body
pub fn payload_from_value(
  value: &Value
, shape: PayloadShape
) -> Result<InboundPayload, Error>
{   let empty = Map::new();
    let fields = value.as_object().unwrap_or(&empty);

    match shape
    {   PayloadShape::Text => {
          let text = non_blank(fields.get("text"))
            .ok_or(Error::MissingField("text"))?;
          Ok(InboundPayload::Text { text })
        }
      , PayloadShape::Question => {
          let question = non_blank(fields.get("question"))
            .ok_or(Error::MissingField("question"))?;
          let choices = match fields.get("choices")
          {   Some(Value::Array(items)) => {
                items.iter().filter_map(choice_text).collect()
              }
            , _ => Vec::new()
          };
          if choices.is_empty()
          {   return Err(Error::MissingField("choices"));
          }
          let instruction = non_blank(fields.get("instruction"));
          Ok(InboundPayload::Question
          {   question
            , instruction
            , choices
          })
        }
    }
}

fn non_blank(value: Option<&Value>) -> Option<String>
{   match value
    {   Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone())
      , _ => None
    }
}

fn choice_text(item: &Value) -> Option<String>
{   match item
    {   Value::String(s) => Some(s.clone())
      , Value::Number(n) => Some(n.to_string())
      , Value::Bool(b) => Some(b.to_string())
      , _ => None
    }
}
