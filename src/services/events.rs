use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::CoreError,
    models::{
        event::{CreateEventRequest, Event, UpdateEventRequest},
        ryd::Ryd,
        user::UserRole,
    },
};

pub struct EventService;

impl EventService {
    pub async fn create(
        pool: &PgPool,
        created_by: Uuid,
        req: &CreateEventRequest,
    ) -> Result<Event, CoreError> {
        if req.name.trim().is_empty() {
            return Err(CoreError::Validation("Event name is required".into()));
        }
        let event: Event = sqlx::query_as(
            "INSERT INTO events (name, event_type, location, starts_at, ends_at, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(&req.name)
        .bind(&req.event_type)
        .bind(&req.location)
        .bind(req.starts_at)
        .bind(req.ends_at)
        .bind(created_by)
        .fetch_one(pool)
        .await?;
        Ok(event)
    }

    pub async fn list_upcoming(pool: &PgPool) -> Result<Vec<Event>, CoreError> {
        let events: Vec<Event> = sqlx::query_as(
            "SELECT * FROM events WHERE starts_at > NOW() - INTERVAL '1 day'
             ORDER BY starts_at",
        )
        .fetch_all(pool)
        .await?;
        Ok(events)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Event, CoreError> {
        let event: Option<Event> = sqlx::query_as("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        event.ok_or_else(|| CoreError::NotFound("Event not found".into()))
    }

    /// Only the creator or an admin may edit an event.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        caller: Uuid,
        caller_role: UserRole,
        req: &UpdateEventRequest,
    ) -> Result<Event, CoreError> {
        let event = Self::get(pool, id).await?;
        if event.created_by != caller && caller_role != UserRole::Admin {
            return Err(CoreError::Unauthorized(
                "Only the event creator can edit it".into(),
            ));
        }

        let event: Event = sqlx::query_as(
            "UPDATE events
             SET name       = COALESCE($1, name),
                 event_type = COALESCE($2, event_type),
                 location   = COALESCE($3, location),
                 starts_at  = COALESCE($4, starts_at),
                 ends_at    = COALESCE($5, ends_at),
                 updated_at = NOW()
             WHERE id = $6
             RETURNING *",
        )
        .bind(&req.name)
        .bind(&req.event_type)
        .bind(&req.location)
        .bind(req.starts_at)
        .bind(req.ends_at)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(event)
    }

    pub async fn rydz_for_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<Ryd>, CoreError> {
        let rydz: Vec<Ryd> = sqlx::query_as(
            "SELECT * FROM rydz
             WHERE event_id = $1 AND status NOT IN ('cancelled')
             ORDER BY departure_time NULLS LAST, created_at",
        )
        .bind(event_id)
        .fetch_all(pool)
        .await?;
        Ok(rydz)
    }
}
