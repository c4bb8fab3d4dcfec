use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserSnapshot;

/// A parent's answer to a pending driver-approval request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    ApproveOnce,
    ApprovePermanently,
    Reject,
}

/// One pending request on the parent's approvals screen: a manifest entry
/// awaiting parental approval, joined with driver/student snapshots.
#[derive(Debug, Serialize)]
pub struct ApprovalRequest {
    pub ryd_id: Uuid,
    pub student: UserSnapshot,
    pub driver: UserSnapshot,
    pub event_name: Option<String>,
    pub destination: Option<String>,
    pub departure_time: Option<DateTime<Utc>>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DecideApprovalRequest {
    pub student_id: Uuid,
    pub driver_id: Uuid,
    pub ryd_id: Uuid,
    pub decision: ApprovalDecision,
}

/// Which of the parent's two permanent lists an operation targets.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverListKind {
    Approved,
    Declined,
}

#[derive(Debug, Deserialize)]
pub struct ApproveDriverRequest {
    pub driver_email: String,
    pub student_ids: Vec<Uuid>,
}

/// An approved driver together with the students they are approved for.
#[derive(Debug, Serialize)]
pub struct ApprovedDriverEntry {
    pub driver: UserSnapshot,
    pub students: Vec<UserSnapshot>,
}

/// Display model for the parent's driver-management screen.
#[derive(Debug, Serialize)]
pub struct DriverLists {
    pub approved: Vec<ApprovedDriverEntry>,
    pub declined: Vec<UserSnapshot>,
    pub managed_students: Vec<UserSnapshot>,
}
