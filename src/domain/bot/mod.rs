//! Chat-platform payloads carried inside envelopes.

pub mod ai_bot;
pub mod customer_service;
mod platform;
pub mod wecom_app;

pub use ai_bot::{AiBotMessage, AiBotRequest, AiBotStreamReply};
pub use customer_service::{KfCallbackEvent, KfMessage, KfMessageBatch};
pub use platform::Platform;
pub use wecom_app::{AppMessage, AppTextReply};
