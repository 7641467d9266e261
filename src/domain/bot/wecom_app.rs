//! Decrypted enterprise-app payloads (XML).

use serde::Deserialize;

use crate::domain::envelope::xml::cdata;
use crate::domain::envelope::EnvelopeError;

#[derive(Debug, Clone, Deserialize)]
pub struct AppMessage {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: String,
    #[serde(rename = "Content", default)]
    pub content: Option<String>,
    #[serde(rename = "MsgId", default)]
    pub msg_id: Option<String>,
    #[serde(rename = "AgentID", default)]
    pub agent_id: Option<String>,
    #[serde(rename = "Event", default)]
    pub event: Option<String>,
}

impl AppMessage {
    pub fn parse(plaintext: &str) -> Result<Self, EnvelopeError> {
        quick_xml::de::from_str(plaintext).map_err(|e| EnvelopeError::Parse(e.to_string()))
    }

    /// Returns `(msg_id, question)` for a non-empty text message.
    pub fn question(&self) -> Option<(&str, &str)> {
        if self.msg_type != "text" {
            return None;
        }
        let content = self.content.as_deref()?.trim();
        let msg_id = self.msg_id.as_deref()?;
        (!content.is_empty()).then_some((msg_id, content))
    }
}

/// Passive text reply, addressed back to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTextReply {
    pub to_user: String,
    pub from_user: String,
    pub create_time: i64,
    pub content: String,
}

impl AppTextReply {
    /// Builds the reply to `message`, swapping sender and recipient.
    pub fn answering(message: &AppMessage, content: impl Into<String>, create_time: i64) -> Self {
        Self {
            to_user: message.from_user_name.clone(),
            from_user: message.to_user_name.clone(),
            create_time,
            content: content.into(),
        }
    }

    /// Built by hand with CDATA fields, like the outbound envelope.
    pub fn to_xml(&self) -> String {
        format!(
            "<xml><ToUserName>{}</ToUserName><FromUserName>{}</FromUserName><CreateTime>{}</CreateTime><MsgType>{}</MsgType><Content>{}</Content></xml>",
            cdata(&self.to_user),
            cdata(&self.from_user),
            self.create_time,
            cdata("text"),
            cdata(&self.content),
        )
    }
}
