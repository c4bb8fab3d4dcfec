use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    error::CoreError,
    models::{
        approval::{ApprovalDecision, ApprovalRequest},
        ryd::PassengerStatus,
        user::{UserRole, UserSnapshot},
    },
    services::{metrics, notifications::NotificationService},
};

/// What a decision does to the parent's permanent driver lists. Approving
/// and declining are mutually exclusive: each mutation removes the driver
/// from the opposite list, so a driver is never on both at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMutation {
    None,
    /// Add the driver to the declined set and drop any approvals.
    DeclineDriver,
    /// Approve the driver for this student and drop any decline.
    ApproveDriverFor(Uuid),
}

/// Transition table of the approval workflow: a parent decision maps to the
/// manifest entry's next status and the permanent-list mutation.
pub fn resolve_transition(
    decision: ApprovalDecision,
    student_id: Uuid,
) -> (PassengerStatus, ListMutation) {
    match decision {
        ApprovalDecision::Reject => {
            (PassengerStatus::RejectedByParent, ListMutation::DeclineDriver)
        }
        ApprovalDecision::ApproveOnce => {
            (PassengerStatus::PendingDriverApproval, ListMutation::None)
        }
        ApprovalDecision::ApprovePermanently => (
            PassengerStatus::PendingDriverApproval,
            ListMutation::ApproveDriverFor(student_id),
        ),
    }
}

pub struct ApprovalService;

impl ApprovalService {
    /// Resolve one pending parental-approval manifest entry.
    ///
    /// The manifest-status transition and the parent-list mutation commit in
    /// a single transaction. Concurrency control is the conditional UPDATE on
    /// `status = 'pending_parent_approval'`: of two racing decisions, the
    /// second sees zero affected rows and fails with `StaleRequest`.
    pub async fn decide_driver_approval(
        pool: &PgPool,
        parent_id: Uuid,
        student_id: Uuid,
        driver_id: Uuid,
        ryd_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<PassengerStatus, CoreError> {
        ensure_parent_of(pool, parent_id, student_id).await?;

        let ryd: Option<(Uuid, String)> =
            sqlx::query_as("SELECT driver_id, status FROM rydz WHERE id = $1")
                .bind(ryd_id)
                .fetch_optional(pool)
                .await?;
        let (ryd_driver, ryd_status) = ryd.ok_or_else(|| {
            CoreError::NotFound("Ryd not found, it may have been deleted".into())
        })?;
        if ryd_driver != driver_id {
            return Err(CoreError::Validation(
                "The selected driver does not match this ryd".into(),
            ));
        }
        if ryd_status == "cancelled" || ryd_status == "completed" {
            return Err(CoreError::StaleRequest(
                "This ryd is no longer active".into(),
            ));
        }

        let (new_status, mutation) = resolve_transition(decision, student_id);

        let mut tx = pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE ryd_passengers SET status = $1, updated_at = NOW()
             WHERE ryd_id = $2 AND user_id = $3 AND status = 'pending_parent_approval'",
        )
        .bind(new_status.as_str())
        .bind(ryd_id)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Already resolved, withdrawn, or never requested.
            return Err(CoreError::StaleRequest(
                "This approval request has already been resolved or withdrawn".into(),
            ));
        }

        match mutation {
            ListMutation::None => {}
            ListMutation::DeclineDriver => {
                sqlx::query(
                    "INSERT INTO declined_drivers (parent_id, driver_id)
                     VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(parent_id)
                .bind(driver_id)
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "DELETE FROM approved_drivers WHERE parent_id = $1 AND driver_id = $2",
                )
                .bind(parent_id)
                .bind(driver_id)
                .execute(&mut *tx)
                .await?;
            }
            ListMutation::ApproveDriverFor(sid) => {
                sqlx::query(
                    "INSERT INTO approved_drivers (parent_id, driver_id, student_id)
                     VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
                )
                .bind(parent_id)
                .bind(driver_id)
                .bind(sid)
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "DELETE FROM declined_drivers WHERE parent_id = $1 AND driver_id = $2",
                )
                .bind(parent_id)
                .bind(driver_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        metrics::APPROVAL_DECISIONS_COUNTER
            .with_label_values(&[decision_label(decision)])
            .inc();

        // Best effort, outside the transaction. A lost notification must not
        // fail an already-committed decision.
        if new_status == PassengerStatus::PendingDriverApproval {
            NotificationService::emit(
                pool,
                driver_id,
                "New passenger request",
                "A parent approved a student's request to join your ryd. Please confirm the seat.",
                "ryd_request",
                Some(&format!("/rydz/{ryd_id}")),
            )
            .await;
        }

        Ok(new_status)
    }

    /// Read side for the parent's approvals screen: every manifest entry in
    /// `pending_parent_approval` belonging to one of the parent's managed
    /// students, joined with driver/student snapshots and ryd details. Inner
    /// joins on the profile tables mean a request with a missing profile is
    /// dropped rather than failing the whole page.
    pub async fn list_pending_approvals(
        pool: &PgPool,
        parent_id: Uuid,
    ) -> Result<Vec<ApprovalRequest>, CoreError> {
        let rows = sqlx::query(
            "SELECT rp.ryd_id, rp.requested_at,
                    s.id AS student_id, s.email AS student_email,
                    s.full_name AS student_name, s.role AS student_role,
                    s.avatar_url AS student_avatar,
                    d.id AS driver_id, d.email AS driver_email,
                    d.full_name AS driver_name, d.role AS driver_role,
                    d.avatar_url AS driver_avatar,
                    r.destination, r.departure_time,
                    e.name AS event_name
             FROM ryd_passengers rp
             JOIN managed_students ms
               ON ms.student_id = rp.user_id AND ms.parent_id = $1
             JOIN rydz r ON r.id = rp.ryd_id
             JOIN users s ON s.id = rp.user_id
             JOIN users d ON d.id = r.driver_id
             LEFT JOIN events e ON e.id = r.event_id
             WHERE rp.status = 'pending_parent_approval'
             ORDER BY rp.requested_at",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;

        let requests = rows
            .iter()
            .map(|row| ApprovalRequest {
                ryd_id: row.get("ryd_id"),
                student: UserSnapshot {
                    id: row.get("student_id"),
                    email: row.get("student_email"),
                    full_name: row.get("student_name"),
                    role: row.get("student_role"),
                    avatar_url: row.get("student_avatar"),
                },
                driver: UserSnapshot {
                    id: row.get("driver_id"),
                    email: row.get("driver_email"),
                    full_name: row.get("driver_name"),
                    role: row.get("driver_role"),
                    avatar_url: row.get("driver_avatar"),
                },
                event_name: row.get("event_name"),
                destination: row.get("destination"),
                departure_time: row.get("departure_time"),
                requested_at: row.get("requested_at"),
            })
            .collect();

        Ok(requests)
    }
}

fn decision_label(decision: ApprovalDecision) -> &'static str {
    match decision {
        ApprovalDecision::ApproveOnce => "approve_once",
        ApprovalDecision::ApprovePermanently => "approve_permanently",
        ApprovalDecision::Reject => "reject",
    }
}

/// Gate for every parent-only operation. A missing profile is an
/// authorization failure, not a lookup failure: the caller claimed to act as
/// a parent and is not one of record.
pub(crate) fn require_parent_role(role: Option<String>) -> Result<(), CoreError> {
    let role = role.ok_or_else(|| {
        CoreError::Unauthorized("No parent profile exists for this account".into())
    })?;
    match role.parse::<UserRole>().map_err(CoreError::Internal)? {
        UserRole::Parent => Ok(()),
        _ => Err(CoreError::Unauthorized(
            "Only parents can perform this action".into(),
        )),
    }
}

/// Authorization for every decision: the caller must be a parent and the
/// target student must be one of their managed students.
pub(crate) async fn ensure_parent_of(
    pool: &PgPool,
    parent_id: Uuid,
    student_id: Uuid,
) -> Result<(), CoreError> {
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(parent_id)
        .fetch_optional(pool)
        .await?;
    require_parent_role(role)?;

    let manages: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM managed_students
          WHERE parent_id = $1 AND student_id = $2)",
    )
    .bind(parent_id)
    .bind(student_id)
    .fetch_one(pool)
    .await?;
    if !manages {
        return Err(CoreError::Unauthorized(
            "This student is not managed by your account".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_declines_driver() {
        let student = Uuid::new_v4();
        let (status, mutation) = resolve_transition(ApprovalDecision::Reject, student);
        assert_eq!(status, PassengerStatus::RejectedByParent);
        assert_eq!(mutation, ListMutation::DeclineDriver);
    }

    #[test]
    fn approve_once_leaves_lists_untouched() {
        let student = Uuid::new_v4();
        let (status, mutation) = resolve_transition(ApprovalDecision::ApproveOnce, student);
        assert_eq!(status, PassengerStatus::PendingDriverApproval);
        assert_eq!(mutation, ListMutation::None);
    }

    #[test]
    fn approve_permanently_records_the_pair() {
        let student = Uuid::new_v4();
        let (status, mutation) =
            resolve_transition(ApprovalDecision::ApprovePermanently, student);
        assert_eq!(status, PassengerStatus::PendingDriverApproval);
        assert_eq!(mutation, ListMutation::ApproveDriverFor(student));
    }

    #[test]
    fn missing_or_wrong_role_is_unauthorized() {
        assert!(matches!(
            require_parent_role(None),
            Err(CoreError::Unauthorized(_))
        ));
        assert!(matches!(
            require_parent_role(Some("student".into())),
            Err(CoreError::Unauthorized(_))
        ));
        assert!(matches!(
            require_parent_role(Some("driver".into())),
            Err(CoreError::Unauthorized(_))
        ));
        assert!(require_parent_role(Some("parent".into())).is_ok());
    }

    #[test]
    fn only_reject_ends_in_a_parent_rejection() {
        // Both approval flavours forward the entry to the driver; only a
        // reject terminates it, and only a reject touches the declined set.
        let student = Uuid::new_v4();
        for decision in [
            ApprovalDecision::ApproveOnce,
            ApprovalDecision::ApprovePermanently,
        ] {
            let (status, mutation) = resolve_transition(decision, student);
            assert_eq!(status, PassengerStatus::PendingDriverApproval);
            assert_ne!(mutation, ListMutation::DeclineDriver);
        }
    }
}
