// ABOUTME: Response envelope model for the gateway invoke endpoint
// ABOUTME: Tagged Payload stages and a total unwrap from raw body to final result

use crate::error::GatewayError;
use serde_json::Value;

/// Longest slice of a non-JSON body carried into an error message.
const BODY_SNIPPET_LEN: usize = 200;

/// One stage of unwrapping an invoke response.
///
/// The gateway wraps results in an `{ok, result, error}` envelope; `result`
/// may carry a `content` block array whose first `text` block is itself a
/// JSON document. Each variant is one layer of that onion.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Body was not JSON at all
    RawError { status: u16, body: String },
    /// Outer success/error wrapper
    Envelope {
        status: u16,
        ok: Option<bool>,
        result: Value,
        error: Option<String>,
    },
    /// A result object holding a `content` array
    ContentBlocks(Value),
    /// Fully unwrapped value, still subject to the embedded-error check
    Decoded(Value),
}

impl Payload {
    /// Classify a raw HTTP response body.
    pub fn classify(status: u16, body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => {
                return Payload::RawError {
                    status,
                    body: body.to_string(),
                }
            }
        };

        let is_envelope = value
            .as_object()
            .map(|o| o.contains_key("ok") || o.contains_key("error"))
            .unwrap_or(false);

        if is_envelope {
            let ok = value.get("ok").and_then(Value::as_bool);
            let error = value.get("error").and_then(error_message);
            let result = value.get("result").cloned().unwrap_or(Value::Null);
            return Payload::Envelope {
                status,
                ok,
                result,
                error,
            };
        }

        if !(200..300).contains(&status) {
            return Payload::Envelope {
                status,
                ok: Some(false),
                result: Value::Null,
                error: None,
            };
        }

        Payload::from_result(value)
    }

    /// Classify an envelope's `result` member.
    fn from_result(result: Value) -> Self {
        let has_blocks = result
            .get("content")
            .map(Value::is_array)
            .unwrap_or(false);
        if has_blocks {
            Payload::ContentBlocks(result)
        } else {
            Payload::Decoded(result)
        }
    }

    /// Advance one layer. `Ok(Err(value))` means unwrapping is finished.
    fn step(self) -> Result<Result<Payload, Value>, GatewayError> {
        match self {
            Payload::RawError { status, body } => Err(GatewayError::Protocol {
                status,
                message: snippet(&body),
            }),
            Payload::Envelope {
                status,
                ok,
                result,
                error,
            } => {
                if ok == Some(false) || error.is_some() {
                    return Err(GatewayError::Remote(
                        error.unwrap_or_else(|| format!("HTTP {status}")),
                    ));
                }
                Ok(Ok(Payload::from_result(result)))
            }
            Payload::ContentBlocks(result) => {
                let text = result
                    .get("content")
                    .and_then(Value::as_array)
                    .and_then(|blocks| {
                        blocks.iter().find(|b| {
                            b.get("type").and_then(Value::as_str) == Some("text")
                        })
                    })
                    .and_then(|b| b.get("text"))
                    .and_then(Value::as_str);

                let decoded: Option<Value> = text.map(|text| {
                    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
                });
                Ok(Ok(Payload::Decoded(decoded.unwrap_or(result))))
            }
            Payload::Decoded(value) => match embedded_error(&value) {
                Some(message) => Err(GatewayError::Remote(message)),
                None => Ok(Err(value)),
            },
        }
    }
}

/// Unwrap a raw invoke response into its final result.
pub fn unwrap_response(status: u16, body: &str) -> Result<Value, GatewayError> {
    let mut payload = Payload::classify(status, body);
    loop {
        match payload.step()? {
            Ok(next) => payload = next,
            Err(value) => return Ok(value),
        }
    }
}

/// Error text from an `error` member that is a string or `{message}` object.
fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => Some(
            o.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

/// A tool-level failure reported inside a successful envelope.
fn embedded_error(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    if let Some(message) = obj.get("error").and_then(error_message) {
        return Some(message);
    }
    if obj.get("status").and_then(Value::as_str) == Some("error") {
        return Some(
            obj.get("message")
                .and_then(Value::as_str)
                .unwrap_or("Tool reported an error")
                .to_string(),
        );
    }
    None
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty body".to_string();
    }
    trimmed.chars().take(BODY_SNIPPET_LEN).collect()
}
