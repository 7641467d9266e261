//! Wire types for the bot webhook endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::envelope::SignatureParams;

/// Query string every platform sends with its callbacks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub msg_signature: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub nonce: String,
    /// Present only on the URL verification handshake.
    #[serde(default)]
    pub echostr: Option<String>,
}

impl CallbackQuery {
    pub fn params(&self) -> SignatureParams {
        SignatureParams::new(&self.msg_signature, &self.timestamp, &self.nonce)
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_conversations: usize,
}
