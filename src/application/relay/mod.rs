//! Platform adapters for the bot relay.
//!
//! Each adapter turns one platform's callbacks into operations on the
//! shared [`RelayRegistry`](crate::domain::relay::RelayRegistry):
//!
//! | Adapter                  | Delivery                         | Waiting             |
//! |--------------------------|----------------------------------|---------------------|
//! | `AiBotAdapter`           | platform polls a stream id       | snapshot, no wait   |
//! | `WecomAppAdapter`        | passive reply to a redelivery    | long-poll per try   |
//! | `CustomerServiceAdapter` | push through the kf API          | until done          |

mod ai_bot;
mod callback;
mod customer_service;
mod errors;
mod producer;
mod settings;
mod wecom_app;

pub use ai_bot::AiBotAdapter;
pub use callback::verify_callback_url;
pub use customer_service::CustomerServiceAdapter;
pub use errors::AdapterError;
pub use producer::AnswerProducer;
pub use settings::RelaySettings;
pub use wecom_app::WecomAppAdapter;
