//! Domain layer: the relay's protocol and state types.
//!
//! # Module Organization
//!
//! - `cipher` - Signed AES envelope codec
//! - `envelope` - JSON/XML wire shapes for codec output
//! - `relay` - Conversation state and registry
//! - `bot` - Platform payloads carried inside envelopes

pub mod bot;
pub mod cipher;
pub mod envelope;
pub mod relay;
