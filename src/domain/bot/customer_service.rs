//! Customer-service ("kf") callback and message types.
//!
//! Callbacks only announce that new messages exist; the messages themselves
//! are pulled with the sync API using the callback's token and a cursor.

use serde::Deserialize;

use crate::domain::envelope::EnvelopeError;

/// `origin` value of messages sent by the external customer.
pub const ORIGIN_CUSTOMER: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct KfCallbackEvent {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: String,
    #[serde(rename = "Event", default)]
    pub event: Option<String>,
    #[serde(rename = "Token", default)]
    pub token: Option<String>,
    #[serde(rename = "OpenKfId", default)]
    pub open_kf_id: Option<String>,
}

impl KfCallbackEvent {
    pub fn parse(plaintext: &str) -> Result<Self, EnvelopeError> {
        quick_xml::de::from_str(plaintext).map_err(|e| EnvelopeError::Parse(e.to_string()))
    }

    /// Returns the sync token if this is a new-message notification.
    pub fn sync_token(&self) -> Option<&str> {
        match self.event.as_deref() {
            Some("kf_msg_or_event") => self.token.as_deref(),
            _ => None,
        }
    }
}

/// One message returned by the sync API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KfMessage {
    pub msgid: String,
    #[serde(default)]
    pub open_kfid: String,
    #[serde(default)]
    pub external_userid: String,
    #[serde(default)]
    pub send_time: i64,
    #[serde(default)]
    pub origin: u32,
    pub msgtype: String,
    #[serde(default)]
    pub text: Option<KfText>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KfText {
    pub content: String,
}

impl KfMessage {
    /// Returns the question text of a customer-sent text message.
    pub fn question(&self) -> Option<&str> {
        if self.origin != ORIGIN_CUSTOMER || self.msgtype != "text" {
            return None;
        }
        self.text
            .as_ref()
            .map(|text| text.content.trim())
            .filter(|content| !content.is_empty())
    }
}

/// One page of the sync API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KfMessageBatch {
    pub messages: Vec<KfMessage>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_message_event() {
        let event = KfCallbackEvent::parse(
            "<xml><ToUserName><![CDATA[ww12345678910]]></ToUserName>\
             <CreateTime>1348831860</CreateTime>\
             <MsgType><![CDATA[event]]></MsgType>\
             <Event><![CDATA[kf_msg_or_event]]></Event>\
             <Token><![CDATA[ENCApHxnGDNAVNY4AaSJKj4Tb5mwsEMzxhFmHVGcra996NR]]></Token>\
             <OpenKfId><![CDATA[wkxxxxxxx]]></OpenKfId></xml>",
        )
        .unwrap();

        assert_eq!(
            event.sync_token(),
            Some("ENCApHxnGDNAVNY4AaSJKj4Tb5mwsEMzxhFmHVGcra996NR")
        );
        assert_eq!(event.open_kf_id.as_deref(), Some("wkxxxxxxx"));
    }

    #[test]
    fn other_events_have_no_sync_token() {
        let event = KfCallbackEvent::parse(
            "<xml><ToUserName>ww1</ToUserName><MsgType>event</MsgType>\
             <Event>kf_account_auth_change</Event><Token>t</Token></xml>",
        )
        .unwrap();
        assert!(event.sync_token().is_none());
    }

    #[test]
    fn only_customer_text_is_a_question() {
        let mut message: KfMessage = serde_json::from_value(serde_json::json!({
            "msgid": "m1",
            "open_kfid": "wk1",
            "external_userid": "wm1",
            "send_time": 1615478585,
            "origin": 3,
            "msgtype": "text",
            "text": {"content": " hello "}
        }))
        .unwrap();
        assert_eq!(message.question(), Some("hello"));

        message.origin = 5;
        assert!(message.question().is_none());
    }
}
