pub mod approvals;
pub mod events;
pub mod health;
pub mod metrics;
pub mod notifications;
pub mod rydz;
pub mod users;
