//! Customer-service API port - Pulls customer messages and pushes replies.

use async_trait::async_trait;

use super::BotCredentials;
use crate::domain::bot::KfMessageBatch;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustomerServiceError {
    /// App has no API secret configured.
    #[error("Customer service app {0} has no API secret")]
    MissingSecret(String),

    /// Network or HTTP failure.
    #[error("Customer service API unavailable: {0}")]
    Unavailable(String),

    /// Platform answered with a non-zero errcode.
    #[error("Customer service API error {code}: {message}")]
    Api { code: i64, message: String },
}

/// Port for the customer-service platform API.
#[async_trait]
pub trait CustomerServiceClient: Send + Sync {
    /// Fetches messages announced by a callback, starting after `cursor`.
    async fn sync_messages(
        &self,
        credentials: &BotCredentials,
        token: &str,
        open_kfid: &str,
        cursor: Option<&str>,
    ) -> Result<KfMessageBatch, CustomerServiceError>;

    /// Sends a text reply to a customer.
    async fn send_text(
        &self,
        credentials: &BotCredentials,
        open_kfid: &str,
        external_userid: &str,
        content: &str,
    ) -> Result<(), CustomerServiceError>;
}
