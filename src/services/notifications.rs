use sqlx::PgPool;
use uuid::Uuid;

use crate::{error::CoreError, models::notification::Notification};

/// The notification emitter. Delivery to devices is someone else's problem;
/// here a notification is a row the client polls for.
pub struct NotificationService;

impl NotificationService {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        title: &str,
        body: &str,
        kind: &str,
        deep_link: Option<&str>,
    ) -> Result<Notification, CoreError> {
        let notification: Notification = sqlx::query_as(
            "INSERT INTO notifications (user_id, title, body, kind, deep_link)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(user_id)
        .bind(title)
        .bind(body)
        .bind(kind)
        .bind(deep_link)
        .fetch_one(pool)
        .await?;
        Ok(notification)
    }

    /// Fire-and-forget variant used after committed workflow transitions.
    /// A failure here must never roll back or fail the decision that
    /// triggered it, so it is logged and swallowed.
    pub async fn emit(
        pool: &PgPool,
        user_id: Uuid,
        title: &str,
        body: &str,
        kind: &str,
        deep_link: Option<&str>,
    ) {
        if let Err(e) = Self::create(pool, user_id, title, body, kind, deep_link).await {
            tracing::warn!("notification to {} dropped: {}", user_id, e);
        }
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Notification>, CoreError> {
        let notifications: Vec<Notification> = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1
             ORDER BY created_at DESC LIMIT 100",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(notifications)
    }

    pub async fn mark_read(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), CoreError> {
        let updated = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(CoreError::NotFound("Notification not found".into()));
        }
        Ok(())
    }

    pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, CoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}
