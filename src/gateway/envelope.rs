use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GatewayError;

/// The canonical response shape every gateway response is normalized into.
///
/// `status` is the HTTP status code, or `0` when the server could not be
/// reached at all. `body` is the decoded JSON body, a JSON string when the
/// body was not JSON, or `null` when it was empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    pub status: u16,
    pub body: Value,
}

impl Envelope {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            ok: (200..300).contains(&status),
            status,
            body,
        }
    }

    /// Envelope for a request that never got a response.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: 0,
            body: serde_json::json!({ "message": message.into() }),
        }
    }

    /// Normalize a raw response body.
    pub fn from_text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self::new(status, body)
    }

    /// Human-readable message carried by the body, if any.
    pub fn message(&self) -> String {
        match &self.body {
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.body.to_string()),
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Decode a successful body, or map the status onto a [`GatewayError`].
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, GatewayError> {
        if !self.ok {
            return Err(self.error());
        }
        serde_json::from_value(self.body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// Like [`Envelope::into_result`] for calls whose body is ignored.
    pub fn into_empty(self) -> Result<(), GatewayError> {
        if self.ok {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn error(&self) -> GatewayError {
        let message = self.message();
        match self.status {
            0 => GatewayError::Unavailable(message),
            401 => GatewayError::Unauthenticated,
            404 => GatewayError::NotFound(message),
            400 | 409 | 422 => GatewayError::Rejected(message),
            status => GatewayError::Server(format!("{}: {}", status, message)),
        }
    }
}
