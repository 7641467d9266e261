//! Bot app credentials
//!
//! One optional app per platform, e.g.
//! `BOT_RELAY__BOTS__WECOM_APP__KB_ID=kb-1`.

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;
use crate::adapters::customer_service::DEFAULT_API_BASE_URL;
use crate::domain::bot::Platform;
use crate::ports::BotCredentials;

/// Length of a platform-issued EncodingAESKey.
const ENCODING_AES_KEY_LEN: usize = 43;

#[derive(Debug, Clone, Deserialize)]
pub struct BotAppConfig {
    /// Knowledge base the app answers from
    pub kb_id: String,

    /// Signature token
    pub token: Secret<String>,

    /// Base64 AES key, 43 characters without padding
    pub encoding_aes_key: Secret<String>,

    /// Corp id; empty for AI bots
    #[serde(default)]
    pub receiver_id: String,

    /// API secret, required for customer service
    pub api_secret: Option<Secret<String>>,
}

impl BotAppConfig {
    fn credentials(&self, platform: Platform) -> BotCredentials {
        let credentials = BotCredentials::new(
            self.kb_id.clone(),
            platform,
            self.token.expose_secret().clone(),
            self.encoding_aes_key.expose_secret().clone(),
            self.receiver_id.clone(),
        );
        match &self.api_secret {
            Some(secret) => credentials.with_api_secret(secret.expose_secret().clone()),
            None => credentials,
        }
    }

    fn validate(&self, platform: Platform) -> Result<(), ValidationError> {
        if self.kb_id.is_empty() {
            return Err(ValidationError::MissingRequired("BOTS__*__KB_ID"));
        }
        if self.encoding_aes_key.expose_secret().len() != ENCODING_AES_KEY_LEN {
            return Err(ValidationError::InvalidEncodingAesKey(platform.as_str()));
        }
        if platform == Platform::CustomerService
            && (self.receiver_id.is_empty() || self.api_secret.is_none())
        {
            return Err(ValidationError::MissingCustomerServiceSecret);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotsConfig {
    pub ai_bot: Option<BotAppConfig>,
    pub wecom_app: Option<BotAppConfig>,
    pub customer_service: Option<BotAppConfig>,

    /// Customer service API host
    #[serde(default = "default_kf_api_base_url")]
    pub kf_api_base_url: String,
}

impl BotsConfig {
    fn apps(&self) -> impl Iterator<Item = (Platform, &BotAppConfig)> {
        [
            (Platform::AiBot, self.ai_bot.as_ref()),
            (Platform::WecomApp, self.wecom_app.as_ref()),
            (Platform::CustomerService, self.customer_service.as_ref()),
        ]
        .into_iter()
        .filter_map(|(platform, app)| app.map(|app| (platform, app)))
    }

    /// Credentials of every configured app.
    pub fn credentials(&self) -> Vec<BotCredentials> {
        self.apps()
            .map(|(platform, app)| app.credentials(platform))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (platform, app) in self.apps() {
            app.validate(platform)?;
        }
        Ok(())
    }
}

impl Default for BotsConfig {
    fn default() -> Self {
        Self {
            ai_bot: None,
            wecom_app: None,
            customer_service: None,
            kf_api_base_url: default_kf_api_base_url(),
        }
    }
}

fn default_kf_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
