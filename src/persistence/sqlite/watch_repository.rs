//! `WatchRepository` for `SqliteStore`.

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::SqliteStore;
use crate::{
    models::{
        AssetIdentity, ChartProvider, MediaSettings, OwnerId, SocialLinks, Watch, WatchId,
        parse_address,
    },
    persistence::{error::PersistenceError, traits::WatchRepository},
};

const SELECT_WATCH_COLUMNS: &str = r#"
    SELECT
        watch_id, owner_id, channel_id,
        token_address, pair_address, token_name, token_symbol, token_decimals,
        min_buy, step, emoji, chart_provider, paused,
        media_enabled, media_image, media_threshold,
        telegram_link, website_link, twitter_link
    FROM watches
"#;

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct WatchRow {
    watch_id: i64,
    owner_id: i64,
    channel_id: i64,
    token_address: String,
    pair_address: String,
    token_name: String,
    token_symbol: String,
    token_decimals: i64,
    min_buy: String,
    step: String,
    emoji: String,
    chart_provider: String,
    paused: bool,
    media_enabled: Option<bool>,
    media_image: Option<String>,
    media_threshold: Option<String>,
    telegram_link: Option<String>,
    website_link: Option<String>,
    twitter_link: Option<String>,
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, PersistenceError> {
    Decimal::from_str(value).map_err(|e| {
        PersistenceError::SerializationError(format!("invalid decimal in {column}: {e}"))
    })
}

impl TryFrom<WatchRow> for Watch {
    type Error = PersistenceError;

    fn try_from(row: WatchRow) -> Result<Self, Self::Error> {
        let address = parse_address(&row.token_address)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let pair = parse_address(&row.pair_address)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let decimals = u8::try_from(row.token_decimals)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let chart = ChartProvider::from_str(&row.chart_provider)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        let media = match row.media_enabled {
            Some(enabled) => Some(MediaSettings {
                enabled,
                image: row.media_image.unwrap_or_default(),
                threshold: match row.media_threshold {
                    Some(threshold) => parse_decimal("media_threshold", &threshold)?,
                    None => MediaSettings::default().threshold,
                },
            }),
            None => None,
        };

        Ok(Watch {
            id: Some(row.watch_id),
            owner_id: row.owner_id,
            channel_id: row.channel_id,
            asset: AssetIdentity {
                address,
                pair,
                name: row.token_name,
                symbol: row.token_symbol,
                decimals,
            },
            min_buy: parse_decimal("min_buy", &row.min_buy)?,
            step: parse_decimal("step", &row.step)?,
            emoji: row.emoji,
            chart,
            paused: row.paused,
            media,
            social: SocialLinks {
                telegram: row.telegram_link,
                website: row.website_link,
                twitter: row.twitter_link,
            },
        })
    }
}

#[async_trait]
impl WatchRepository for SqliteStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn find_watches_for_owner(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<Watch>, PersistenceError> {
        let query = format!("{SELECT_WATCH_COLUMNS} WHERE owner_id = ? ORDER BY watch_id");
        let rows = self
            .execute_query_with_error_handling(
                "query watches for owner",
                sqlx::query_as::<_, WatchRow>(&query).bind(owner_id).fetch_all(&self.pool),
            )
            .await?;

        let watches = rows.into_iter().map(Watch::try_from).collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(owner_id, count = watches.len(), "Watches retrieved for owner.");
        Ok(watches)
    }

    #[tracing::instrument(skip(self, watch), fields(owner_id = watch.owner_id, channel_id = watch.channel_id), level = "debug")]
    async fn create_watch(&self, watch: &Watch) -> Result<Watch, PersistenceError> {
        if watch.id.is_some() {
            return Err(PersistenceError::InvalidInput(
                "watch already carries an id".to_string(),
            ));
        }

        let media = watch.media.as_ref();
        let result = self
            .execute_query_with_error_handling(
                "insert watch",
                sqlx::query(
                    r#"
                    INSERT INTO watches (
                        owner_id, channel_id,
                        token_address, pair_address, token_name, token_symbol, token_decimals,
                        min_buy, step, emoji, chart_provider, paused,
                        media_enabled, media_image, media_threshold,
                        telegram_link, website_link, twitter_link
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(watch.owner_id)
                .bind(watch.channel_id)
                .bind(watch.asset.address.to_string())
                .bind(watch.asset.pair.to_string())
                .bind(&watch.asset.name)
                .bind(&watch.asset.symbol)
                .bind(i64::from(watch.asset.decimals))
                .bind(watch.min_buy.to_string())
                .bind(watch.step.to_string())
                .bind(&watch.emoji)
                .bind(watch.chart.as_str())
                .bind(watch.paused)
                .bind(media.map(|m| m.enabled))
                .bind(media.map(|m| m.image.clone()))
                .bind(media.map(|m| m.threshold.to_string()))
                .bind(watch.social.telegram.as_deref())
                .bind(watch.social.website.as_deref())
                .bind(watch.social.twitter.as_deref())
                .execute(&self.pool),
            )
            .await?;

        let id = result.last_insert_rowid();
        tracing::info!(watch_id = id, "Watch created.");
        Ok(Watch { id: Some(id), ..watch.clone() })
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn delete_watch(&self, id: WatchId) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "delete watch",
                sqlx::query("DELETE FROM watches WHERE watch_id = ?").bind(id).execute(&self.pool),
            )
            .await?;

        let deleted = result.rows_affected() > 0;
        tracing::debug!(watch_id = id, deleted, "Watch delete executed.");
        Ok(deleted)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn find_watch(&self, id: WatchId) -> Result<Option<Watch>, PersistenceError> {
        let query = format!("{SELECT_WATCH_COLUMNS} WHERE watch_id = ?");
        let row = self
            .execute_query_with_error_handling(
                "query watch",
                sqlx::query_as::<_, WatchRow>(&query).bind(id).fetch_optional(&self.pool),
            )
            .await?;

        row.map(Watch::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn set_paused(&self, id: WatchId, paused: bool) -> Result<(), PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "set watch paused flag",
                sqlx::query(
                    "UPDATE watches SET paused = ?, updated_at = CURRENT_TIMESTAMP WHERE watch_id = ?",
                )
                .bind(paused)
                .bind(id)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("watch {id}")));
        }
        tracing::debug!(watch_id = id, paused, "Watch paused flag updated.");
        Ok(())
    }
}
