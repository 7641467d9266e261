//! Relay registry errors.

use thiserror::Error;

use super::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Another poller is already parked on this conversation.
    #[error("A poller is already attached to conversation {0}")]
    PollerAlreadyAttached(ConversationId),
}
