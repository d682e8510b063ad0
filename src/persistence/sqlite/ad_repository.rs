//! `AdRepository` for `SqliteStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::SqliteStore;
use crate::{
    models::Advertisement,
    persistence::{error::PersistenceError, traits::AdRepository},
};

#[derive(sqlx::FromRow)]
struct AdRow {
    ad_id: i64,
    token_name: String,
    text: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<AdRow> for Advertisement {
    fn from(row: AdRow) -> Self {
        Advertisement {
            id: row.ad_id,
            token_name: row.token_name,
            text: row.text,
            start_time: row.start_time,
            end_time: row.end_time,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl AdRepository for SqliteStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn running_ads(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Advertisement>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "query active ads",
                sqlx::query_as::<_, AdRow>(
                    r#"
                    SELECT ad_id, token_name, text, start_time, end_time, is_active
                    FROM advertisements
                    WHERE is_active = 1
                    "#,
                )
                .fetch_all(&self.pool),
            )
            .await?;

        // Window checks happen on the model so timestamp encoding never
        // affects which ads run.
        Ok(rows.into_iter().map(Advertisement::from).filter(|ad| ad.is_running_at(now)).collect())
    }

    #[tracing::instrument(skip(self, ad), level = "debug")]
    async fn create_ad(&self, ad: &Advertisement) -> Result<i64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "insert ad",
                sqlx::query(
                    r#"
                    INSERT INTO advertisements (token_name, text, start_time, end_time, is_active)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&ad.token_name)
                .bind(&ad.text)
                .bind(ad.start_time)
                .bind(ad.end_time)
                .bind(ad.is_active)
                .execute(&self.pool),
            )
            .await?;
        Ok(result.last_insert_rowid())
    }
}
