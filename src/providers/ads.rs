use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use super::traits::{AdProvider, ProviderError};
use crate::persistence::AdRepository;

/// Picks one running advertisement at random from the ad store.
pub struct RepositoryAdProvider<R: ?Sized> {
    repo: Arc<R>,
}

impl<R: AdRepository + ?Sized> RepositoryAdProvider<R> {
    /// Creates a provider over `repo`.
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R: AdRepository + ?Sized> AdProvider for RepositoryAdProvider<R> {
    async fn active_ad_text(&self, now: DateTime<Utc>) -> Result<Option<String>, ProviderError> {
        let ads = self.repo.running_ads(now).await?;
        let picked = ads.choose(&mut rand::thread_rng()).map(|ad| ad.text.clone());
        Ok(picked)
    }
}
