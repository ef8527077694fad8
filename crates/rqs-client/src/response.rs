//! Response envelope shared by every broker endpoint.
//!
//! The broker wraps every body as `{"data": ..., "error": ...}`. Successful
//! responses are unwrapped into [`SuccessResponse`]; failures keep the whole
//! body so it can be reported verbatim.

use crate::error::{Operation, RqsError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Successful broker response carrying the `data` payload
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessResponse<T = Value> {
    data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    /// Get the data contained in the response
    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SuccessResponse<U> {
        SuccessResponse { data: f(self.data) }
    }
}

/// Wire envelope written by the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T, E> {
    pub data: T,
    pub error: E,
}

impl<T> Envelope<T, Option<String>> {
    pub fn success(data: T) -> Self {
        Self { data, error: None }
    }
}

impl Envelope<Option<Value>, String> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: error.into(),
        }
    }
}

/// Take the `data` member out of a successful response body
pub(crate) fn extract_data(operation: Operation, body: Value) -> Result<Value, RqsError> {
    match body {
        Value::Object(mut fields) => {
            fields
                .remove("data")
                .ok_or_else(|| RqsError::InvalidResponse {
                    operation,
                    message: "response body has no 'data' field".to_string(),
                })
        }
        other => Err(RqsError::InvalidResponse {
            operation,
            message: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

/// Read a list of identifiers from a list endpoint payload.
///
/// Entries are either bare strings or objects carrying `id` or `queueId`.
pub(crate) fn identifier_list(operation: Operation, data: Value) -> Result<Vec<String>, RqsError> {
    let entries = match data {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(RqsError::InvalidResponse {
                operation,
                message: format!("expected an array of identifiers, got {}", json_kind(&other)),
            })
        }
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(id) => Ok(id),
            Value::Object(fields) => fields
                .get("id")
                .or_else(|| fields.get("queueId"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| RqsError::InvalidResponse {
                    operation,
                    message: "list entry has no 'id' field".to_string(),
                }),
            other => Err(RqsError::InvalidResponse {
                operation,
                message: format!("unexpected list entry: {}", json_kind(&other)),
            }),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
