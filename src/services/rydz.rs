use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::CoreError,
    models::{
        ryd::{
            CreateRydRequest, ManifestEntry, PassengerStatus, PassengerView, Ryd, RydStatus,
            RydView,
        },
        user::UserSnapshot,
    },
    services::{metrics, notifications::NotificationService},
};

/// How one of the student's parents stands toward the ryd's driver, as read
/// from the permanent approved/declined lists.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct ParentStanding {
    pub parent_id: Uuid,
    pub approved: bool,
    pub declined: bool,
}

/// Initial manifest status for a join request, computed from the standings of
/// every parent on file. Declines win over approvals; a student with no
/// parents on file, or with every parent pre-approving the driver, skips the
/// parental step entirely.
pub fn initial_join_status(parents: &[ParentStanding]) -> PassengerStatus {
    if parents.iter().any(|p| p.declined) {
        return PassengerStatus::RejectedByParent;
    }
    if parents.is_empty() || parents.iter().all(|p| p.approved) {
        return PassengerStatus::PendingDriverApproval;
    }
    PassengerStatus::PendingParentApproval
}

/// Ryd lifecycle transitions the driver may perform.
pub fn ryd_transition_allowed(from: RydStatus, to: RydStatus) -> bool {
    matches!(
        (from, to),
        (RydStatus::Planning, RydStatus::Open)
            | (RydStatus::Planning, RydStatus::Cancelled)
            | (RydStatus::Open, RydStatus::InProgress)
            | (RydStatus::Open, RydStatus::Cancelled)
            | (RydStatus::InProgress, RydStatus::Completed)
            | (RydStatus::InProgress, RydStatus::Cancelled)
    )
}

/// Join requests are accepted while the ryd is being planned or is open.
pub fn ryd_accepts_passengers(status: RydStatus) -> bool {
    matches!(status, RydStatus::Planning | RydStatus::Open)
}

fn seat_available(occupied: i64, seats_total: i32) -> bool {
    occupied < seats_total as i64
}

/// Required current status for each manifest transition a driver performs.
/// `None` means drivers never set that status directly.
pub fn manifest_precondition(to: PassengerStatus) -> Option<PassengerStatus> {
    match to {
        PassengerStatus::ConfirmedByDriver | PassengerStatus::RejectedByDriver => {
            Some(PassengerStatus::PendingDriverApproval)
        }
        PassengerStatus::OnBoard => Some(PassengerStatus::ConfirmedByDriver),
        PassengerStatus::Completed => Some(PassengerStatus::OnBoard),
        _ => None,
    }
}

pub struct RydService;

impl RydService {
    /// A new ryd starts in `planning`; the driver opens it for passengers via
    /// `update_status` once the details are settled.
    pub async fn create(
        pool: &PgPool,
        driver_id: Uuid,
        req: &CreateRydRequest,
    ) -> Result<Ryd, CoreError> {
        let can_drive: Option<bool> =
            sqlx::query_scalar("SELECT can_drive FROM users WHERE id = $1")
                .bind(driver_id)
                .fetch_optional(pool)
                .await?;
        match can_drive {
            Some(true) => {}
            Some(false) => {
                return Err(CoreError::Unauthorized(
                    "Your profile is not registered as a driver".into(),
                ))
            }
            None => return Err(CoreError::NotFound("Driver profile not found".into())),
        }

        let direction = req.direction.as_deref().unwrap_or("to_event");
        if direction != "to_event" && direction != "from_event" {
            return Err(CoreError::Validation(format!(
                "Unknown direction: {direction}"
            )));
        }
        let seats = req.seats_total.unwrap_or(4);
        if !(1..=12).contains(&seats) {
            return Err(CoreError::Validation(
                "Seat count must be between 1 and 12".into(),
            ));
        }

        let ryd: Ryd = sqlx::query_as(
            "INSERT INTO rydz (driver_id, event_id, direction, status, seats_total,
                               departure_time, origin, destination, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(driver_id)
        .bind(req.event_id)
        .bind(direction)
        .bind(RydStatus::Planning.to_string())
        .bind(seats)
        .bind(req.departure_time)
        .bind(&req.origin)
        .bind(&req.destination)
        .bind(&req.notes)
        .fetch_one(pool)
        .await?;
        Ok(ryd)
    }

    /// A student asks for a seat. The entry's initial status comes from the
    /// permanent driver lists of the student's parents; only requests that
    /// land in `pending_parent_approval` show up on an approvals screen.
    ///
    /// The whole request runs in one transaction with the ryd row locked, so
    /// two students racing for the last seat cannot both get in.
    pub async fn request_to_join(
        pool: &PgPool,
        student_id: Uuid,
        ryd_id: Uuid,
    ) -> Result<ManifestEntry, CoreError> {
        let mut tx = pool.begin().await?;

        let ryd: Option<Ryd> = sqlx::query_as("SELECT * FROM rydz WHERE id = $1 FOR UPDATE")
            .bind(ryd_id)
            .fetch_optional(&mut *tx)
            .await?;
        let ryd = ryd.ok_or_else(|| CoreError::NotFound("Ryd not found".into()))?;

        let ryd_status: RydStatus = ryd.status.parse().map_err(CoreError::Internal)?;
        if !ryd_accepts_passengers(ryd_status) {
            return Err(CoreError::StaleRequest(
                "This ryd is no longer accepting passengers".into(),
            ));
        }
        if ryd.driver_id == student_id {
            return Err(CoreError::Validation(
                "You cannot join a ryd you are driving".into(),
            ));
        }

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM ryd_passengers WHERE ryd_id = $1 AND user_id = $2)",
        )
        .bind(ryd_id)
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Err(CoreError::Validation(
                "You have already requested to join this ryd".into(),
            ));
        }

        let occupied: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ryd_passengers
             WHERE ryd_id = $1 AND status IN
               ('pending_parent_approval', 'pending_driver_approval',
                'confirmed_by_driver', 'on_board')",
        )
        .bind(ryd_id)
        .fetch_one(&mut *tx)
        .await?;
        if !seat_available(occupied, ryd.seats_total) {
            return Err(CoreError::Validation("This ryd is full".into()));
        }

        let parents: Vec<ParentStanding> = sqlx::query_as(
            "SELECT ms.parent_id,
                    EXISTS(SELECT 1 FROM approved_drivers ad
                            WHERE ad.parent_id = ms.parent_id
                              AND ad.driver_id = $2 AND ad.student_id = $1) AS approved,
                    EXISTS(SELECT 1 FROM declined_drivers dd
                            WHERE dd.parent_id = ms.parent_id
                              AND dd.driver_id = $2) AS declined
             FROM managed_students ms
             WHERE ms.student_id = $1",
        )
        .bind(student_id)
        .bind(ryd.driver_id)
        .fetch_all(&mut *tx)
        .await?;

        let status = initial_join_status(&parents);

        let entry: ManifestEntry = sqlx::query_as(
            "INSERT INTO ryd_passengers (ryd_id, user_id, status)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(ryd_id)
        .bind(student_id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        metrics::JOIN_REQUESTS_COUNTER
            .with_label_values(&[status.as_str()])
            .inc();

        match status {
            PassengerStatus::PendingParentApproval => {
                for p in &parents {
                    NotificationService::emit(
                        pool,
                        p.parent_id,
                        "Driver approval needed",
                        "Your student requested a seat with a driver you haven't approved yet.",
                        "approval_request",
                        Some("/approvals"),
                    )
                    .await;
                }
            }
            PassengerStatus::PendingDriverApproval => {
                NotificationService::emit(
                    pool,
                    ryd.driver_id,
                    "New passenger request",
                    "A student requested a seat on your ryd. Please confirm.",
                    "ryd_request",
                    Some(&format!("/rydz/{ryd_id}")),
                )
                .await;
            }
            PassengerStatus::RejectedByParent => {
                NotificationService::emit(
                    pool,
                    student_id,
                    "Request declined",
                    "A parent has declined this driver, so the request was not sent.",
                    "ryd_request",
                    Some(&format!("/rydz/{ryd_id}")),
                )
                .await;
            }
            _ => {}
        }

        Ok(entry)
    }

    /// The driver confirms or rejects an entry a parent already forwarded.
    pub async fn driver_respond(
        pool: &PgPool,
        driver_id: Uuid,
        ryd_id: Uuid,
        passenger_id: Uuid,
        accept: bool,
    ) -> Result<PassengerStatus, CoreError> {
        let new_status = if accept {
            PassengerStatus::ConfirmedByDriver
        } else {
            PassengerStatus::RejectedByDriver
        };
        Self::driver_transition(
            pool,
            driver_id,
            ryd_id,
            passenger_id,
            new_status,
            "This request is not awaiting your confirmation",
        )
        .await?;

        let (title, body) = if accept {
            ("Seat confirmed", "The driver confirmed your seat.")
        } else {
            ("Seat declined", "The driver declined your request.")
        };
        NotificationService::emit(
            pool,
            passenger_id,
            title,
            body,
            "ryd_update",
            Some(&format!("/rydz/{ryd_id}")),
        )
        .await;

        Ok(new_status)
    }

    /// Passenger withdraws. Valid from any pre-completion state.
    pub async fn cancel_join(
        pool: &PgPool,
        student_id: Uuid,
        ryd_id: Uuid,
    ) -> Result<(), CoreError> {
        let updated = sqlx::query(
            "UPDATE ryd_passengers SET status = 'cancelled_by_passenger', updated_at = NOW()
             WHERE ryd_id = $1 AND user_id = $2 AND status IN
               ('pending_parent_approval', 'pending_driver_approval', 'confirmed_by_driver')",
        )
        .bind(ryd_id)
        .bind(student_id)
        .execute(pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(CoreError::StaleRequest(
                "No cancellable request found for this ryd".into(),
            ));
        }
        Ok(())
    }

    /// Driver marks a confirmed passenger as picked up.
    pub async fn mark_on_board(
        pool: &PgPool,
        driver_id: Uuid,
        ryd_id: Uuid,
        passenger_id: Uuid,
    ) -> Result<(), CoreError> {
        Self::driver_transition(
            pool,
            driver_id,
            ryd_id,
            passenger_id,
            PassengerStatus::OnBoard,
            "This passenger is not confirmed for pickup",
        )
        .await
    }

    /// Driver marks an on-board passenger as dropped off, ahead of the ryd
    /// itself finishing.
    pub async fn mark_completed(
        pool: &PgPool,
        driver_id: Uuid,
        ryd_id: Uuid,
        passenger_id: Uuid,
    ) -> Result<(), CoreError> {
        Self::driver_transition(
            pool,
            driver_id,
            ryd_id,
            passenger_id,
            PassengerStatus::Completed,
            "This passenger is not on board",
        )
        .await
    }

    /// Shared conditional update for driver-performed manifest transitions.
    /// The WHERE clause on the required prior status is what keeps a stale or
    /// repeated action from clobbering a later state.
    async fn driver_transition(
        pool: &PgPool,
        driver_id: Uuid,
        ryd_id: Uuid,
        passenger_id: Uuid,
        to: PassengerStatus,
        stale_message: &str,
    ) -> Result<(), CoreError> {
        Self::ensure_ryd_driver(pool, ryd_id, driver_id).await?;

        let from = manifest_precondition(to).ok_or_else(|| {
            CoreError::Validation(format!(
                "Drivers cannot set a passenger to {}",
                to.as_str()
            ))
        })?;

        let updated = sqlx::query(
            "UPDATE ryd_passengers SET status = $1, updated_at = NOW()
             WHERE ryd_id = $2 AND user_id = $3 AND status = $4",
        )
        .bind(to.as_str())
        .bind(ryd_id)
        .bind(passenger_id)
        .bind(from.as_str())
        .execute(pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(CoreError::StaleRequest(stale_message.into()));
        }
        Ok(())
    }

    /// Driver advances the ryd lifecycle. Completing a ryd also completes its
    /// on-board passengers.
    pub async fn update_status(
        pool: &PgPool,
        driver_id: Uuid,
        ryd_id: Uuid,
        to: RydStatus,
    ) -> Result<Ryd, CoreError> {
        let ryd = Self::ensure_ryd_driver(pool, ryd_id, driver_id).await?;
        let from: RydStatus = ryd
            .status
            .parse()
            .map_err(CoreError::Internal)?;
        if !ryd_transition_allowed(from, to) {
            return Err(CoreError::Validation(format!(
                "Cannot move a ryd from {from} to {to}"
            )));
        }

        let mut tx = pool.begin().await?;
        let ryd: Ryd = sqlx::query_as(
            "UPDATE rydz SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(to.to_string())
        .bind(ryd_id)
        .fetch_one(&mut *tx)
        .await?;
        if to == RydStatus::Completed {
            sqlx::query(
                "UPDATE ryd_passengers SET status = 'completed', updated_at = NOW()
                 WHERE ryd_id = $1 AND status = 'on_board'",
            )
            .bind(ryd_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(ryd)
    }

    pub async fn get(pool: &PgPool, ryd_id: Uuid) -> Result<RydView, CoreError> {
        let ryd: Option<Ryd> = sqlx::query_as("SELECT * FROM rydz WHERE id = $1")
            .bind(ryd_id)
            .fetch_optional(pool)
            .await?;
        let ryd = ryd.ok_or_else(|| CoreError::NotFound("Ryd not found".into()))?;

        let driver: UserSnapshot = sqlx::query_as(
            "SELECT id, email, full_name, role, avatar_url FROM users WHERE id = $1",
        )
        .bind(ryd.driver_id)
        .fetch_one(pool)
        .await?;

        let passengers: Vec<PassengerView> = sqlx::query_as(
            "SELECT rp.user_id, u.full_name, rp.status, rp.requested_at, rp.updated_at
             FROM ryd_passengers rp
             JOIN users u ON u.id = rp.user_id
             WHERE rp.ryd_id = $1
             ORDER BY rp.requested_at",
        )
        .bind(ryd_id)
        .fetch_all(pool)
        .await?;

        Ok(RydView {
            ryd,
            driver,
            passengers,
        })
    }

    /// Rydz the user drives or rides on, most recent first.
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Ryd>, CoreError> {
        let rydz: Vec<Ryd> = sqlx::query_as(
            "SELECT r.* FROM rydz r
             WHERE r.driver_id = $1
                OR EXISTS(SELECT 1 FROM ryd_passengers rp
                           WHERE rp.ryd_id = r.id AND rp.user_id = $1)
             ORDER BY r.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rydz)
    }

    async fn ensure_ryd_driver(
        pool: &PgPool,
        ryd_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Ryd, CoreError> {
        let ryd: Option<Ryd> = sqlx::query_as("SELECT * FROM rydz WHERE id = $1")
            .bind(ryd_id)
            .fetch_optional(pool)
            .await?;
        let ryd = ryd.ok_or_else(|| CoreError::NotFound("Ryd not found".into()))?;
        if ryd.driver_id != driver_id {
            return Err(CoreError::Unauthorized(
                "Only the ryd's driver can do that".into(),
            ));
        }
        Ok(ryd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(approved: bool, declined: bool) -> ParentStanding {
        ParentStanding {
            parent_id: Uuid::new_v4(),
            approved,
            declined,
        }
    }

    #[test]
    fn no_parents_skips_parental_approval() {
        assert_eq!(
            initial_join_status(&[]),
            PassengerStatus::PendingDriverApproval
        );
    }

    #[test]
    fn unapproved_driver_requires_parent_decision() {
        assert_eq!(
            initial_join_status(&[standing(false, false)]),
            PassengerStatus::PendingParentApproval
        );
    }

    #[test]
    fn fully_preapproved_driver_bypasses_parents() {
        let parents = [standing(true, false), standing(true, false)];
        assert_eq!(
            initial_join_status(&parents),
            PassengerStatus::PendingDriverApproval
        );
    }

    #[test]
    fn one_unapproved_parent_still_prompts() {
        let parents = [standing(true, false), standing(false, false)];
        assert_eq!(
            initial_join_status(&parents),
            PassengerStatus::PendingParentApproval
        );
    }

    #[test]
    fn any_decline_wins_over_approvals() {
        let parents = [standing(true, false), standing(false, true)];
        assert_eq!(
            initial_join_status(&parents),
            PassengerStatus::RejectedByParent
        );
    }

    #[test]
    fn lifecycle_transitions() {
        assert!(ryd_transition_allowed(RydStatus::Planning, RydStatus::Open));
        assert!(ryd_transition_allowed(RydStatus::Open, RydStatus::InProgress));
        assert!(ryd_transition_allowed(
            RydStatus::InProgress,
            RydStatus::Completed
        ));
        assert!(ryd_transition_allowed(RydStatus::Open, RydStatus::Cancelled));
        assert!(!ryd_transition_allowed(RydStatus::Completed, RydStatus::Open));
        assert!(!ryd_transition_allowed(
            RydStatus::Cancelled,
            RydStatus::InProgress
        ));
        assert!(!ryd_transition_allowed(
            RydStatus::Planning,
            RydStatus::Completed
        ));
    }

    #[test]
    fn new_rydz_are_joinable_from_planning() {
        // A ryd is created in planning, so joins must be accepted there as
        // well as after the driver opens it.
        assert!(ryd_accepts_passengers(RydStatus::Planning));
        assert!(ryd_accepts_passengers(RydStatus::Open));
        assert!(!ryd_accepts_passengers(RydStatus::InProgress));
        assert!(!ryd_accepts_passengers(RydStatus::Completed));
        assert!(!ryd_accepts_passengers(RydStatus::Cancelled));
    }

    #[test]
    fn seat_accounting() {
        assert!(seat_available(0, 4));
        assert!(seat_available(3, 4));
        assert!(!seat_available(4, 4));
        assert!(!seat_available(5, 4));
    }

    #[test]
    fn driver_transitions_require_the_prior_state() {
        assert_eq!(
            manifest_precondition(PassengerStatus::ConfirmedByDriver),
            Some(PassengerStatus::PendingDriverApproval)
        );
        assert_eq!(
            manifest_precondition(PassengerStatus::RejectedByDriver),
            Some(PassengerStatus::PendingDriverApproval)
        );
        assert_eq!(
            manifest_precondition(PassengerStatus::OnBoard),
            Some(PassengerStatus::ConfirmedByDriver)
        );
        assert_eq!(
            manifest_precondition(PassengerStatus::Completed),
            Some(PassengerStatus::OnBoard)
        );
        // Parental-workflow statuses are never set by the driver.
        assert_eq!(
            manifest_precondition(PassengerStatus::PendingParentApproval),
            None
        );
        assert_eq!(
            manifest_precondition(PassengerStatus::RejectedByParent),
            None
        );
        assert_eq!(
            manifest_precondition(PassengerStatus::CancelledByPassenger),
            None
        );
    }
}
