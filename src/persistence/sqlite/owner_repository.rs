//! `OwnerRepository` for `SqliteStore`.

use async_trait::async_trait;

use super::SqliteStore;
use crate::{
    models::{MAX_WATCHES_PER_OWNER, Owner, OwnerId, WatchId},
    persistence::{error::PersistenceError, traits::OwnerRepository},
};

#[derive(sqlx::FromRow)]
struct OwnerRow {
    owner_id: i64,
    username: Option<String>,
}

impl SqliteStore {
    async fn fetch_watch_ids(&self, owner_id: OwnerId) -> Result<Vec<WatchId>, PersistenceError> {
        self.execute_query_with_error_handling(
            "query owner watch ids",
            sqlx::query_scalar::<_, i64>(
                "SELECT watch_id FROM owner_watches WHERE owner_id = ? ORDER BY rowid",
            )
            .bind(owner_id)
            .fetch_all(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl OwnerRepository for SqliteStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_owners(&self) -> Result<Vec<Owner>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "query owners",
                sqlx::query_as::<_, OwnerRow>(
                    "SELECT owner_id, username FROM owners ORDER BY owner_id",
                )
                .fetch_all(&self.pool),
            )
            .await?;

        let mut owners = Vec::with_capacity(rows.len());
        for row in rows {
            let watch_ids = self.fetch_watch_ids(row.owner_id).await?;
            owners.push(Owner { id: row.owner_id, username: row.username, watch_ids });
        }
        tracing::debug!(count = owners.len(), "Owners retrieved.");
        Ok(owners)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn watch_ids_for_owner(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<WatchId>, PersistenceError> {
        self.fetch_watch_ids(owner_id).await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn find_owner_of_watch(
        &self,
        watch_id: WatchId,
    ) -> Result<Option<OwnerId>, PersistenceError> {
        self.execute_query_with_error_handling(
            "query owner of watch",
            sqlx::query_scalar::<_, i64>("SELECT owner_id FROM owner_watches WHERE watch_id = ?")
                .bind(watch_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn add_watch_to_owner(
        &self,
        owner_id: OwnerId,
        watch_id: WatchId,
    ) -> Result<(), PersistenceError> {
        let mut tx = self
            .execute_query_with_error_handling("begin transaction", self.pool.begin())
            .await?;

        self.execute_query_with_error_handling(
            "ensure owner exists",
            sqlx::query("INSERT OR IGNORE INTO owners (owner_id) VALUES (?)")
                .bind(owner_id)
                .execute(&mut *tx),
        )
        .await?;

        let held: Vec<i64> = self
            .execute_query_with_error_handling(
                "query owner watch ids",
                sqlx::query_scalar::<_, i64>("SELECT watch_id FROM owner_watches WHERE owner_id = ?")
                    .bind(owner_id)
                    .fetch_all(&mut *tx),
            )
            .await?;

        if held.contains(&watch_id) {
            return Err(PersistenceError::AlreadyExists(format!(
                "watch {watch_id} for owner {owner_id}"
            )));
        }
        if held.len() >= MAX_WATCHES_PER_OWNER {
            tracing::warn!(owner_id, watch_id, "Owner is at watch capacity.");
            return Err(PersistenceError::CapacityReached { owner_id });
        }

        self.execute_query_with_error_handling(
            "insert owner watch",
            sqlx::query("INSERT INTO owner_watches (owner_id, watch_id) VALUES (?, ?)")
                .bind(owner_id)
                .bind(watch_id)
                .execute(&mut *tx),
        )
        .await?;

        self.execute_query_with_error_handling("commit transaction", tx.commit()).await?;
        tracing::debug!(owner_id, watch_id, "Watch linked to owner.");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn remove_watch_from_owner(
        &self,
        owner_id: OwnerId,
        watch_id: WatchId,
    ) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "delete owner watch",
                sqlx::query("DELETE FROM owner_watches WHERE owner_id = ? AND watch_id = ?")
                    .bind(owner_id)
                    .bind(watch_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn upsert_owner(
        &self,
        owner_id: OwnerId,
        username: Option<String>,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "upsert owner",
            sqlx::query(
                r#"
                INSERT INTO owners (owner_id, username) VALUES (?, ?)
                ON CONFLICT (owner_id) DO UPDATE SET username = excluded.username
                "#,
            )
            .bind(owner_id)
            .bind(username)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
