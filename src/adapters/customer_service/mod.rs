//! Customer service API adapters.

mod wecom_kf_client;

pub use wecom_kf_client::{WecomKfClient, DEFAULT_API_BASE_URL};
