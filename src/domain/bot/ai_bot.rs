//! Decrypted AI-bot payloads.
//!
//! The first callback carries the user's text. The platform then keeps
//! sending `stream` refresh callbacks that name the stream id chosen in our
//! first reply, until a reply with `finish: true`.

use serde::{Deserialize, Serialize};

use crate::domain::envelope::EnvelopeError;

#[derive(Debug, Clone, Deserialize)]
pub struct AiBotMessage {
    pub msgid: String,
    #[serde(default)]
    pub aibotid: String,
    #[serde(default)]
    pub chatid: Option<String>,
    #[serde(default)]
    pub chattype: Option<String>,
    #[serde(default)]
    pub from: Option<AiBotSender>,
    pub msgtype: String,
    #[serde(default)]
    pub text: Option<AiBotText>,
    #[serde(default)]
    pub stream: Option<AiBotStreamRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiBotSender {
    pub userid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiBotText {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiBotStreamRef {
    pub id: String,
}

/// What an AI-bot callback asks the relay to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiBotRequest {
    /// First contact: a user question.
    Ask {
        msgid: String,
        question: String,
        user_id: Option<String>,
    },
    /// Poll for more of a stream started earlier.
    Refresh { stream_id: String },
    /// A message type the relay does not answer (images, events, ...).
    Unsupported(String),
}

impl AiBotMessage {
    /// Parses a decrypted callback payload.
    pub fn parse(plaintext: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(plaintext).map_err(|e| EnvelopeError::Parse(e.to_string()))
    }

    pub fn into_request(self) -> AiBotRequest {
        match self.msgtype.as_str() {
            "text" => {
                if let Some(text) = self.text {
                    return AiBotRequest::Ask {
                        msgid: self.msgid,
                        question: text.content,
                        user_id: self.from.map(|from| from.userid),
                    };
                }
            }
            "stream" => {
                if let Some(stream) = self.stream {
                    return AiBotRequest::Refresh {
                        stream_id: stream.id,
                    };
                }
            }
            _ => {}
        }
        AiBotRequest::Unsupported(self.msgtype)
    }
}

/// Plaintext of a stream reply, before encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AiBotStreamReply {
    msgtype: &'static str,
    stream: AiBotStreamBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct AiBotStreamBody {
    id: String,
    finish: bool,
    content: String,
}

impl AiBotStreamReply {
    pub fn new(stream_id: impl Into<String>, content: impl Into<String>, finish: bool) -> Self {
        Self {
            msgtype: "stream",
            stream: AiBotStreamBody {
                id: stream_id.into(),
                finish,
                content: content.into(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Serialization(e.to_string()))
    }
}
