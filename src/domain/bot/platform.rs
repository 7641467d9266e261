//! Supported chat platforms.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::envelope::EnvelopeFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// WeChat Work "AI bot" (JSON, stream refresh polling).
    AiBot,
    /// WeChat Work self-built enterprise app (XML, passive replies).
    WecomApp,
    /// WeChat customer-service accounts (XML callbacks, push delivery).
    CustomerService,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::AiBot => "ai_bot",
            Platform::WecomApp => "wecom_app",
            Platform::CustomerService => "customer_service",
        }
    }

    /// Wire shape of this platform's envelopes.
    pub fn envelope_format(&self) -> EnvelopeFormat {
        match self {
            Platform::AiBot => EnvelopeFormat::Json,
            Platform::WecomApp | Platform::CustomerService => EnvelopeFormat::Xml,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
