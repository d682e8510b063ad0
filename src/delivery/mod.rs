//! Delivery of rendered alerts to destination channels.

mod error;
mod telegram;
mod traits;

pub use error::DeliveryError;
pub use telegram::TelegramSink;
#[cfg(test)]
pub use traits::MockDeliverySink;
pub use traits::DeliverySink;
