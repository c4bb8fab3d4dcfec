use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::UserSnapshot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RydStatus {
    Planning,
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RydStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RydStatus::Planning => "planning",
            RydStatus::Open => "open",
            RydStatus::InProgress => "in_progress",
            RydStatus::Completed => "completed",
            RydStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RydStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(RydStatus::Planning),
            "open" => Ok(RydStatus::Open),
            "in_progress" => Ok(RydStatus::InProgress),
            "completed" => Ok(RydStatus::Completed),
            "cancelled" => Ok(RydStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Unknown ryd status: {s}")),
        }
    }
}

/// Status of one passenger manifest entry. The parental approval workflow
/// owns the first three transitions; the driver owns the rest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassengerStatus {
    PendingParentApproval,
    PendingDriverApproval,
    RejectedByParent,
    ConfirmedByDriver,
    RejectedByDriver,
    OnBoard,
    Completed,
    CancelledByPassenger,
}

impl PassengerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassengerStatus::PendingParentApproval => "pending_parent_approval",
            PassengerStatus::PendingDriverApproval => "pending_driver_approval",
            PassengerStatus::RejectedByParent => "rejected_by_parent",
            PassengerStatus::ConfirmedByDriver => "confirmed_by_driver",
            PassengerStatus::RejectedByDriver => "rejected_by_driver",
            PassengerStatus::OnBoard => "on_board",
            PassengerStatus::Completed => "completed",
            PassengerStatus::CancelledByPassenger => "cancelled_by_passenger",
        }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ryd {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub event_id: Option<Uuid>,
    pub direction: String,
    pub status: String,
    pub seats_total: i32,
    pub departure_time: Option<DateTime<Utc>>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ManifestEntry {
    pub ryd_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ryd detail view: the ryd plus its driver and resolved manifest.
#[derive(Debug, Serialize)]
pub struct RydView {
    #[serde(flatten)]
    pub ryd: Ryd,
    pub driver: UserSnapshot,
    pub passengers: Vec<PassengerView>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PassengerView {
    pub user_id: Uuid,
    pub full_name: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRydRequest {
    pub event_id: Option<Uuid>,
    pub direction: Option<String>,
    pub seats_total: Option<i32>,
    pub departure_time: Option<DateTime<Utc>>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DriverRespondRequest {
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRydStatusRequest {
    pub status: RydStatus,
}
