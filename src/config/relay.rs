//! Relay timing and user-facing texts

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::relay::RelaySettings;

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Lifetime of platform-id bindings in seconds
    #[serde(default = "default_binding_ttl")]
    pub binding_ttl_secs: u64,

    /// Upper bound on one answer generation in seconds
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// Age after which the janitor drops a conversation, in seconds
    #[serde(default = "default_max_conversation_age")]
    pub max_conversation_age_secs: u64,

    /// Janitor sweep interval in seconds
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval_secs: u64,

    /// Long-poll wait per passive-reply attempt in milliseconds
    #[serde(default = "default_long_poll_wait")]
    pub long_poll_wait_ms: u64,

    /// Deliveries the enterprise-app platform makes per message
    #[serde(default = "default_passive_reply_attempts")]
    pub passive_reply_attempts: u32,

    pub trailer: Option<String>,
    pub thinking_text: Option<String>,
    pub retry_text: Option<String>,
    pub not_found_text: Option<String>,
    pub pending_text: Option<String>,
    pub failure_text: Option<String>,

    /// Answer page template with `{kb_id}` and `{conversation_id}`
    pub answer_page_url: Option<String>,
}

impl RelayConfig {
    pub fn max_conversation_age(&self) -> Duration {
        Duration::from_secs(self.max_conversation_age_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    pub fn long_poll_wait(&self) -> Duration {
        Duration::from_millis(self.long_poll_wait_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.binding_ttl_secs == 0 {
            return Err(ValidationError::InvalidRelayTiming("binding_ttl_secs"));
        }
        if self.generation_timeout_secs == 0 {
            return Err(ValidationError::InvalidRelayTiming("generation_timeout_secs"));
        }
        if self.max_conversation_age_secs < self.generation_timeout_secs {
            return Err(ValidationError::InvalidRelayTiming(
                "max_conversation_age_secs shorter than generation timeout",
            ));
        }
        if self.janitor_interval_secs == 0 {
            return Err(ValidationError::InvalidRelayTiming("janitor_interval_secs"));
        }
        if self.long_poll_wait_ms == 0 {
            return Err(ValidationError::InvalidRelayTiming("long_poll_wait_ms"));
        }
        if self.passive_reply_attempts == 0 {
            return Err(ValidationError::InvalidRelayTiming("passive_reply_attempts"));
        }
        Ok(())
    }

    /// Settings handed to the platform adapters; unset texts keep defaults.
    pub fn to_settings(&self) -> RelaySettings {
        let defaults = RelaySettings::default();
        RelaySettings {
            binding_ttl: Duration::from_secs(self.binding_ttl_secs),
            generation_timeout: Duration::from_secs(self.generation_timeout_secs),
            long_poll_wait: self.long_poll_wait(),
            passive_reply_attempts: self.passive_reply_attempts,
            trailer: self.trailer.clone().unwrap_or(defaults.trailer),
            thinking_text: self.thinking_text.clone().unwrap_or(defaults.thinking_text),
            retry_text: self.retry_text.clone().unwrap_or(defaults.retry_text),
            not_found_text: self.not_found_text.clone().unwrap_or(defaults.not_found_text),
            pending_text: self.pending_text.clone().unwrap_or(defaults.pending_text),
            failure_text: self.failure_text.clone().unwrap_or(defaults.failure_text),
            answer_page_url: self
                .answer_page_url
                .clone()
                .filter(|url| !url.is_empty()),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            binding_ttl_secs: default_binding_ttl(),
            generation_timeout_secs: default_generation_timeout(),
            max_conversation_age_secs: default_max_conversation_age(),
            janitor_interval_secs: default_janitor_interval(),
            long_poll_wait_ms: default_long_poll_wait(),
            passive_reply_attempts: default_passive_reply_attempts(),
            trailer: None,
            thinking_text: None,
            retry_text: None,
            not_found_text: None,
            pending_text: None,
            failure_text: None,
            answer_page_url: None,
        }
    }
}

fn default_binding_ttl() -> u64 {
    900
}

fn default_generation_timeout() -> u64 {
    300
}

fn default_max_conversation_age() -> u64 {
    1800
}

fn default_janitor_interval() -> u64 {
    60
}

fn default_long_poll_wait() -> u64 {
    4500
}

fn default_passive_reply_attempts() -> u32 {
    3
}
