//! Application layer - platform adapters orchestrating the relay.
//!
//! Coordinates the domain (cipher, envelope, relay registry) with the ports
//! for each platform's delivery style.

pub mod relay;

pub use relay::{
    verify_callback_url, AdapterError, AiBotAdapter, AnswerProducer, CustomerServiceAdapter,
    RelaySettings, WecomAppAdapter,
};
