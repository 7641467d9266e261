//! Bot credentials port - Per-app secrets owned by the knowledge-base config.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};

use crate::domain::bot::Platform;
use crate::domain::cipher::{CipherContext, CipherError};

/// Stored configuration of one chat-platform app.
#[derive(Debug, Clone)]
pub struct BotCredentials {
    pub kb_id: String,
    pub platform: Platform,
    /// Callback token used in signatures.
    pub token: Secret<String>,
    /// 43-character base64 AES key.
    pub encoding_aes_key: Secret<String>,
    /// Corp id for enterprise apps and customer service, empty for AI bots.
    pub receiver_id: String,
    /// App secret for outbound API calls (customer service only).
    pub api_secret: Option<Secret<String>>,
}

impl BotCredentials {
    pub fn new(
        kb_id: impl Into<String>,
        platform: Platform,
        token: impl Into<String>,
        encoding_aes_key: impl Into<String>,
        receiver_id: impl Into<String>,
    ) -> Self {
        Self {
            kb_id: kb_id.into(),
            platform,
            token: Secret::new(token.into()),
            encoding_aes_key: Secret::new(encoding_aes_key.into()),
            receiver_id: receiver_id.into(),
            api_secret: None,
        }
    }

    pub fn with_api_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = Some(Secret::new(secret.into()));
        self
    }

    /// Builds the cipher context for one request.
    pub fn cipher(&self) -> Result<CipherContext, CipherError> {
        CipherContext::new(
            self.token.expose_secret().clone(),
            self.encoding_aes_key.expose_secret(),
            self.receiver_id.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Port for looking up a knowledge base's app credentials.
#[async_trait]
pub trait BotCredentialsReader: Send + Sync {
    async fn find(
        &self,
        kb_id: &str,
        platform: Platform,
    ) -> Result<Option<BotCredentials>, CredentialsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_is_built_from_credentials() {
        let credentials = BotCredentials::new(
            "kb-1",
            Platform::WecomApp,
            "token",
            "jWmYm7qr5nMoAUwZRjGtBxmz3KA1tkAj3ykkR6q2B2C",
            "corp",
        );
        let cipher = credentials.cipher().unwrap();
        assert_eq!(cipher.receiver_id(), "corp");
    }

    #[test]
    fn bad_key_surfaces_cipher_error() {
        let credentials = BotCredentials::new("kb-1", Platform::AiBot, "token", "short", "");
        assert!(credentials.cipher().is_err());
    }
}
