//! Errors surfaced by the platform adapters.

use thiserror::Error;

use crate::domain::cipher::CipherError;
use crate::domain::envelope::EnvelopeError;
use crate::domain::relay::RelayError;
use crate::ports::{BridgeError, CustomerServiceError, ExternalKey, GenerationError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Signature, key, padding or receiver failures.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    /// A platform id whose binding lapsed or never existed.
    #[error("No live binding for {0}")]
    BindingExpiredOrMissing(ExternalKey),

    #[error("Answer generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    #[error(transparent)]
    Generation(GenerationError),

    #[error(transparent)]
    CustomerService(#[from] CustomerServiceError),
}

impl From<GenerationError> for AdapterError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Timeout(secs) => AdapterError::GenerationTimeout(secs),
            other => AdapterError::Generation(other),
        }
    }
}

impl AdapterError {
    /// True when the request itself is bad rather than the relay's backends.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AdapterError::Cipher(_) | AdapterError::Envelope(_))
    }
}
