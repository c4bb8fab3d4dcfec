use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::CoreError,
    models::user::{UpdateProfileRequest, User, UserSnapshot},
    services::driver_list::ensure_parent,
};

pub struct UserService;

impl UserService {
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<User, CoreError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        user.ok_or_else(|| CoreError::NotFound("User not found".into()))
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, CoreError> {
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(pool)
                .await?;
        Ok(user)
    }

    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateProfileRequest,
    ) -> Result<User, CoreError> {
        let user: Option<User> = sqlx::query_as(
            "UPDATE users
             SET full_name  = COALESCE($1, full_name),
                 phone      = COALESCE($2, phone),
                 avatar_url = COALESCE($3, avatar_url),
                 can_drive  = COALESCE($4, can_drive),
                 updated_at = NOW()
             WHERE id = $5
             RETURNING *",
        )
        .bind(&req.full_name)
        .bind(&req.phone)
        .bind(&req.avatar_url)
        .bind(req.can_drive)
        .bind(id)
        .fetch_optional(pool)
        .await?;
        user.ok_or_else(|| CoreError::NotFound("User not found".into()))
    }

    pub async fn managed_students(
        pool: &PgPool,
        parent_id: Uuid,
    ) -> Result<Vec<UserSnapshot>, CoreError> {
        let students: Vec<UserSnapshot> = sqlx::query_as(
            "SELECT u.id, u.email, u.full_name, u.role, u.avatar_url
             FROM managed_students ms
             JOIN users u ON u.id = ms.student_id
             WHERE ms.parent_id = $1
             ORDER BY u.full_name",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;
        Ok(students)
    }

    pub async fn associated_parents(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<UserSnapshot>, CoreError> {
        let parents: Vec<UserSnapshot> = sqlx::query_as(
            "SELECT u.id, u.email, u.full_name, u.role, u.avatar_url
             FROM managed_students ms
             JOIN users u ON u.id = ms.parent_id
             WHERE ms.student_id = $1
             ORDER BY u.full_name",
        )
        .bind(student_id)
        .fetch_all(pool)
        .await?;
        Ok(parents)
    }

    /// Parent links a student account (by email) to their own. Idempotent.
    pub async fn link_student(
        pool: &PgPool,
        parent_id: Uuid,
        student_email: &str,
    ) -> Result<UserSnapshot, CoreError> {
        ensure_parent(pool, parent_id).await?;

        let student = Self::find_by_email(pool, student_email)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("No user found with email {student_email}"))
            })?;
        if student.id == parent_id {
            return Err(CoreError::Validation(
                "You cannot add yourself as your own student".into(),
            ));
        }

        sqlx::query(
            "INSERT INTO managed_students (parent_id, student_id)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(parent_id)
        .bind(student.id)
        .execute(pool)
        .await?;

        Ok(student.into())
    }

    pub async fn unlink_student(
        pool: &PgPool,
        parent_id: Uuid,
        student_id: Uuid,
    ) -> Result<(), CoreError> {
        ensure_parent(pool, parent_id).await?;
        sqlx::query("DELETE FROM managed_students WHERE parent_id = $1 AND student_id = $2")
            .bind(parent_id)
            .bind(student_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
