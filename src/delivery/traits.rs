use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::error::DeliveryError;
use crate::{models::ChannelId, notification::Notification};

/// Sends alerts to a channel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Sends `notification` as a photo with caption when it carries an image,
    /// otherwise as a plain message.
    async fn deliver(
        &self,
        channel_id: ChannelId,
        notification: &Notification,
    ) -> Result<(), DeliveryError>;
}
