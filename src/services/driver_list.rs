use std::collections::HashMap;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    error::CoreError,
    models::{
        approval::{ApprovedDriverEntry, DriverListKind, DriverLists},
        user::UserSnapshot,
    },
    services::approvals::require_parent_role,
};

/// Mutations to a parent's permanent approved/declined driver lists,
/// independent of any specific ryd.
pub struct DriverListService;

impl DriverListService {
    /// Remove a driver from one of the two lists. Idempotent; removing from
    /// one list never adds to the other.
    pub async fn remove_from_list(
        pool: &PgPool,
        parent_id: Uuid,
        driver_id: Uuid,
        list: DriverListKind,
    ) -> Result<(), CoreError> {
        ensure_parent(pool, parent_id).await?;

        let sql = match list {
            DriverListKind::Approved => {
                "DELETE FROM approved_drivers WHERE parent_id = $1 AND driver_id = $2"
            }
            DriverListKind::Declined => {
                "DELETE FROM declined_drivers WHERE parent_id = $1 AND driver_id = $2"
            }
        };
        sqlx::query(sql)
            .bind(parent_id)
            .bind(driver_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Pre-approve a driver (looked up by email) for a set of managed
    /// students. Replacement semantics: the given set entirely overwrites any
    /// previous approval for this driver, which is how an existing approval
    /// is re-edited. Also clears any standing decline for the driver.
    pub async fn approve_driver_for_students(
        pool: &PgPool,
        parent_id: Uuid,
        driver_email: &str,
        student_ids: &[Uuid],
    ) -> Result<UserSnapshot, CoreError> {
        if student_ids.is_empty() {
            return Err(CoreError::Validation(
                "Select at least one student to approve this driver for".into(),
            ));
        }
        ensure_parent(pool, parent_id).await?;

        let driver: Option<UserSnapshot> = sqlx::query_as(
            "SELECT id, email, full_name, role, avatar_url
             FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(driver_email)
        .fetch_optional(pool)
        .await?;
        let driver = driver.ok_or_else(|| {
            CoreError::NotFound(format!("No user found with email {driver_email}"))
        })?;
        if driver.id == parent_id {
            return Err(CoreError::Validation(
                "You cannot approve yourself as a driver".into(),
            ));
        }

        let managed_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM managed_students
             WHERE parent_id = $1 AND student_id = ANY($2)",
        )
        .bind(parent_id)
        .bind(student_ids)
        .fetch_one(pool)
        .await?;
        if managed_count != student_ids.len() as i64 {
            return Err(CoreError::Unauthorized(
                "One or more selected students are not managed by your account".into(),
            ));
        }

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM approved_drivers WHERE parent_id = $1 AND driver_id = $2")
            .bind(parent_id)
            .bind(driver.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO approved_drivers (parent_id, driver_id, student_id)
             SELECT $1, $2, UNNEST($3::uuid[])
             ON CONFLICT DO NOTHING",
        )
        .bind(parent_id)
        .bind(driver.id)
        .bind(student_ids)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM declined_drivers WHERE parent_id = $1 AND driver_id = $2")
            .bind(parent_id)
            .bind(driver.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(driver)
    }

    /// Display model for the driver-management screen: approved drivers with
    /// their student sets, declined drivers, and the parent's students.
    pub async fn get_driver_lists(
        pool: &PgPool,
        parent_id: Uuid,
    ) -> Result<DriverLists, CoreError> {
        ensure_parent(pool, parent_id).await?;

        let approved_rows = sqlx::query(
            "SELECT d.id AS driver_id, d.email AS driver_email,
                    d.full_name AS driver_name, d.role AS driver_role,
                    d.avatar_url AS driver_avatar,
                    s.id AS student_id, s.email AS student_email,
                    s.full_name AS student_name, s.role AS student_role,
                    s.avatar_url AS student_avatar
             FROM approved_drivers ad
             JOIN users d ON d.id = ad.driver_id
             JOIN users s ON s.id = ad.student_id
             WHERE ad.parent_id = $1
             ORDER BY d.full_name, s.full_name",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;

        let approved = group_approved_rows(
            approved_rows
                .iter()
                .map(|row| {
                    (
                        UserSnapshot {
                            id: row.get("driver_id"),
                            email: row.get("driver_email"),
                            full_name: row.get("driver_name"),
                            role: row.get("driver_role"),
                            avatar_url: row.get("driver_avatar"),
                        },
                        UserSnapshot {
                            id: row.get("student_id"),
                            email: row.get("student_email"),
                            full_name: row.get("student_name"),
                            role: row.get("student_role"),
                            avatar_url: row.get("student_avatar"),
                        },
                    )
                })
                .collect(),
        );

        let declined: Vec<UserSnapshot> = sqlx::query_as(
            "SELECT u.id, u.email, u.full_name, u.role, u.avatar_url
             FROM declined_drivers dd
             JOIN users u ON u.id = dd.driver_id
             WHERE dd.parent_id = $1
             ORDER BY u.full_name",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;

        let managed_students: Vec<UserSnapshot> = sqlx::query_as(
            "SELECT u.id, u.email, u.full_name, u.role, u.avatar_url
             FROM managed_students ms
             JOIN users u ON u.id = ms.student_id
             WHERE ms.parent_id = $1
             ORDER BY u.full_name",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;

        Ok(DriverLists {
            approved,
            declined,
            managed_students,
        })
    }
}

/// Collapse (driver, student) pairs into one entry per driver, preserving the
/// driver ordering of the input.
fn group_approved_rows(rows: Vec<(UserSnapshot, UserSnapshot)>) -> Vec<ApprovedDriverEntry> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut by_driver: HashMap<Uuid, ApprovedDriverEntry> = HashMap::new();

    for (driver, student) in rows {
        let entry = by_driver.entry(driver.id).or_insert_with(|| {
            order.push(driver.id);
            ApprovedDriverEntry {
                driver,
                students: Vec::new(),
            }
        });
        entry.students.push(student);
    }

    order
        .into_iter()
        .filter_map(|id| by_driver.remove(&id))
        .collect()
}

pub(crate) async fn ensure_parent(pool: &PgPool, parent_id: Uuid) -> Result<(), CoreError> {
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(parent_id)
        .fetch_optional(pool)
        .await?;
    require_parent_role(role)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str) -> UserSnapshot {
        UserSnapshot {
            id: Uuid::new_v4(),
            email: format!("{name}@example.com"),
            full_name: name.to_string(),
            role: "driver".into(),
            avatar_url: None,
        }
    }

    #[test]
    fn groups_pairs_by_driver_preserving_order() {
        let alice = snapshot("Alice");
        let bob = snapshot("Bob");
        let s1 = snapshot("Student One");
        let s2 = snapshot("Student Two");

        let rows = vec![
            (alice.clone(), s1.clone()),
            (alice.clone(), s2.clone()),
            (bob.clone(), s1.clone()),
        ];
        let grouped = group_approved_rows(rows);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].driver.id, alice.id);
        assert_eq!(grouped[0].students.len(), 2);
        assert_eq!(grouped[1].driver.id, bob.id);
        assert_eq!(grouped[1].students.len(), 1);
    }

    #[test]
    fn empty_input_groups_to_nothing() {
        assert!(group_approved_rows(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn empty_student_selection_is_rejected_before_any_io() {
        // connect_lazy performs no I/O; the validation must fail first.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let err = DriverListService::approve_driver_for_students(
            &pool,
            Uuid::new_v4(),
            "driver@example.com",
            &[],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
