//! Bot relay - streams knowledge-base answers to enterprise chat platforms.
//!
//! Platforms deliver signed, encrypted webhooks and expect encrypted replies
//! within a few seconds, while answers take much longer to generate. The
//! relay decouples the two: a background producer buffers each answer in the
//! conversation registry and platform adapters serve that buffer through
//! whichever delivery style the platform supports.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
