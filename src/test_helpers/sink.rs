//! A `DeliverySink` that records what it was asked to send.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

use crate::{
    delivery::{DeliveryError, DeliverySink},
    models::ChannelId,
    notification::Notification,
};

/// Records successful deliveries in completion order.
///
/// A sink built with [`RecordingSink::failing_with`] rejects every call.
/// [`RecordingSink::delay_when`] holds back notifications whose text
/// contains a fragment.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(ChannelId, Notification)>>,
    calls: AtomicUsize,
    failure: Option<DeliveryError>,
    delays: Vec<(String, Duration)>,
}

impl RecordingSink {
    /// A sink that accepts everything immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every call with `error`.
    pub fn failing_with(error: DeliveryError) -> Self {
        Self { failure: Some(error), ..Self::default() }
    }

    /// Delays notifications whose text contains `fragment` by `delay`.
    pub fn delay_when(mut self, fragment: &str, delay: Duration) -> Self {
        self.delays.push((fragment.to_string(), delay));
        self
    }

    /// Number of delivery calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Successful deliveries in completion order.
    pub fn delivered(&self) -> Vec<(ChannelId, Notification)> {
        self.delivered.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Waits until at least `count` calls were made. Returns `false` on
    /// timeout.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.calls() < count {
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(
        &self,
        channel_id: ChannelId,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        let delay = self
            .delays
            .iter()
            .find(|(fragment, _)| notification.text.contains(fragment.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            sleep(delay).await;
        }

        if let Some(error) = &self.failure {
            self.calls.fetch_add(1, Ordering::SeqCst);
            return Err(error.clone());
        }

        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((channel_id, notification.clone()));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
