use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewSubscription, Subscription};
use super::repo_types::SubscriptionRow;
use crate::import::store::{StoreError, SubscriptionSink};

const COLUMNS: &str = r#"
    id, client_name, frequency, wp_theme, php_version, ga4_status, analytics_check,
    last_update, next_update_due, update_status, updated_by, comments,
    comment_updated_at, comment_updated_by, hosting_details, database_details,
    created_at, updated_at
"#;

/// All subscriptions ordered by client name.
pub async fn list_all(db: &PgPool) -> sqlx::Result<Vec<Subscription>> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {COLUMNS} FROM subscriptions ORDER BY client_name ASC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(Subscription::from).collect())
}

pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {COLUMNS} FROM subscriptions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(Subscription::from))
}

pub async fn create(db: &PgPool, new: &NewSubscription, actor: Uuid) -> sqlx::Result<Subscription> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        r#"
        INSERT INTO subscriptions
            (client_name, frequency, wp_theme, php_version, ga4_status, analytics_check,
             last_update, next_update_due, update_status, comments, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(new.client_name.trim())
    .bind(new.frequency.as_str())
    .bind(&new.wp_theme)
    .bind(&new.php_version)
    .bind(new.ga4_status.as_str())
    .bind(new.analytics_check)
    .bind(new.last_update)
    .bind(new.next_update_due)
    .bind(new.update_status.as_str())
    .bind(&new.comments)
    .bind(actor)
    .fetch_one(db)
    .await?;
    Ok(row.into())
}

/// Writes every editable column of `sub`.
///
/// With `expected_updated_at` set, the write only happens if the stored
/// version still matches; `None` is returned when no row was written.
pub async fn update(
    db: &PgPool,
    sub: &Subscription,
    expected_updated_at: Option<OffsetDateTime>,
) -> sqlx::Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        r#"
        UPDATE subscriptions SET
            client_name = $2, frequency = $3, wp_theme = $4, php_version = $5,
            ga4_status = $6, analytics_check = $7, last_update = $8, next_update_due = $9,
            update_status = $10, updated_by = $11, comments = $12,
            comment_updated_at = $13, comment_updated_by = $14,
            hosting_details = $15, database_details = $16, updated_at = now()
        WHERE id = $1 AND ($17::timestamptz IS NULL OR updated_at = $17)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(sub.id)
    .bind(sub.client_name.trim())
    .bind(sub.frequency.as_str())
    .bind(&sub.wp_theme)
    .bind(&sub.php_version)
    .bind(sub.ga4_status.as_str())
    .bind(sub.analytics_check)
    .bind(sub.last_update)
    .bind(sub.next_update_due)
    .bind(sub.update_status.as_str())
    .bind(sub.updated_by)
    .bind(&sub.comments)
    .bind(sub.comment_updated_at)
    .bind(sub.comment_updated_by)
    .bind(sub.hosting_details.as_ref().map(Json))
    .bind(sub.database_details.as_ref().map(Json))
    .bind(expected_updated_at)
    .fetch_optional(db)
    .await?;
    Ok(row.map(Subscription::from))
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Importer storage backed by the `subscriptions` table.
#[derive(Clone)]
pub struct PgSubscriptionSink {
    db: PgPool,
}

impl PgSubscriptionSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionSink for PgSubscriptionSink {
    async fn upsert_batch(&self, batch: &[NewSubscription]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let backend = |e: sqlx::Error| StoreError::Backend(e.to_string());
        let mut tx = self.db.begin().await.map_err(backend)?;

        let keys: Vec<String> = batch.iter().map(NewSubscription::dedup_key).collect();
        let stored: HashMap<String, NewSubscription> = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {COLUMNS} FROM subscriptions WHERE lower(client_name) = ANY($1) FOR UPDATE"
        ))
        .bind(&keys)
        .fetch_all(&mut *tx)
        .await
        .map_err(backend)?
        .into_iter()
        .map(|row| {
            let sub = NewSubscription::from(Subscription::from(row));
            (sub.dedup_key(), sub)
        })
        .collect();

        let now = OffsetDateTime::now_utc();
        let rows: Vec<NewSubscription> = batch
            .iter()
            .map(|row| match stored.get(&row.dedup_key()) {
                Some(existing) => row.clone().merged_over(existing, now),
                None => row.clone(),
            })
            .collect();

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO subscriptions (client_name, frequency, wp_theme, php_version, \
             ga4_status, analytics_check, last_update, next_update_due, update_status, comments) ",
        );
        qb.push_values(&rows, |mut b, row| {
            b.push_bind(row.client_name.trim().to_string())
                .push_bind(row.frequency.as_str())
                .push_bind(row.wp_theme.clone())
                .push_bind(row.php_version.clone())
                .push_bind(row.ga4_status.as_str())
                .push_bind(row.analytics_check)
                .push_bind(row.last_update)
                .push_bind(row.next_update_due)
                .push_bind(row.update_status.as_str())
                .push_bind(row.comments.clone());
        });
        // Rows are already merged over the locked stored state; the
        // COALESCEs only matter for a client inserted concurrently.
        qb.push(
            r#"
            ON CONFLICT ((lower(client_name))) DO UPDATE SET
                client_name = EXCLUDED.client_name,
                frequency = EXCLUDED.frequency,
                wp_theme = COALESCE(EXCLUDED.wp_theme, subscriptions.wp_theme),
                php_version = COALESCE(EXCLUDED.php_version, subscriptions.php_version),
                ga4_status = EXCLUDED.ga4_status,
                analytics_check = EXCLUDED.analytics_check,
                last_update = EXCLUDED.last_update,
                next_update_due = EXCLUDED.next_update_due,
                update_status = EXCLUDED.update_status,
                comments = COALESCE(EXCLUDED.comments, subscriptions.comments),
                updated_at = now()
            "#,
        );

        qb.build().execute(&mut *tx).await.map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn exists_by_name(&self, client_name: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE lower(client_name) = lower($1))",
        )
        .bind(client_name.trim())
        .fetch_one(&self.db)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn insert(&self, row: &NewSubscription) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (client_name, frequency, wp_theme, php_version, ga4_status, analytics_check,
                 last_update, next_update_due, update_status, comments)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(row.client_name.trim())
        .bind(row.frequency.as_str())
        .bind(&row.wp_theme)
        .bind(&row.php_version)
        .bind(row.ga4_status.as_str())
        .bind(row.analytics_check)
        .bind(row.last_update)
        .bind(row.next_update_due)
        .bind(row.update_status.as_str())
        .bind(&row.comments)
        .execute(&self.db)
        .await
        .map_err(|e| StoreError::from_sqlx(e, &row.client_name))?;
        Ok(())
    }
}
