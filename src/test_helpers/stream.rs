//! An in-process `EventStreamProvider` driven by the test.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    models::TradeEvent,
    stream::{EventStream, EventStreamProvider, StreamError, StreamItem},
};

#[derive(Default)]
struct Scripted {
    streams: HashMap<Address, (mpsc::Sender<StreamItem>, CancellationToken)>,
    subscribe_calls: usize,
    fail: bool,
    subscribe_delay: Option<Duration>,
}

/// Hands out one channel per subscribed pair and lets the test push items
/// into it.
#[derive(Default)]
pub struct ScriptedStreamProvider {
    inner: Mutex<Scripted>,
}

impl ScriptedStreamProvider {
    /// A provider that accepts every subscription immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every `subscribe` call fails.
    pub fn failing() -> Self {
        Self { inner: Mutex::new(Scripted { fail: true, ..Scripted::default() }) }
    }

    /// Makes every `subscribe` call wait `delay` before it answers, like a
    /// slow upstream handshake.
    pub fn with_subscribe_delay(self, delay: Duration) -> Self {
        self.lock().subscribe_delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Scripted> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of `subscribe` calls so far, failed ones included.
    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }

    /// Cancellation token of the latest subscription to `pair`.
    pub fn cancel_token(&self, pair: Address) -> Option<CancellationToken> {
        self.lock().streams.get(&pair).map(|(_, cancel)| cancel.clone())
    }

    /// Pushes one batch of events. Returns `false` if the reader is gone.
    pub async fn push(&self, pair: Address, events: Vec<TradeEvent>) -> bool {
        self.send(pair, StreamItem::Events(events)).await
    }

    /// Pushes a stream failure.
    pub async fn fail(&self, pair: Address, error: StreamError) -> bool {
        self.send(pair, StreamItem::Error(error)).await
    }

    /// Completes the stream for `pair`.
    pub fn complete(&self, pair: Address) {
        self.lock().streams.remove(&pair);
    }

    async fn send(&self, pair: Address, item: StreamItem) -> bool {
        let sender = self.lock().streams.get(&pair).map(|(tx, _)| tx.clone());
        match sender {
            Some(tx) => tx.send(item).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl EventStreamProvider for ScriptedStreamProvider {
    async fn subscribe(&self, pair: Address) -> Result<EventStream, StreamError> {
        let delay = self.lock().subscribe_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        inner.subscribe_calls += 1;
        if inner.fail {
            return Err(StreamError::Connect("scripted failure".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        inner.streams.insert(pair, (tx, cancel.clone()));
        Ok(EventStream { events: rx, cancel })
    }
}
