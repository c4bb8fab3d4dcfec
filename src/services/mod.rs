pub mod approvals;
pub mod driver_list;
pub mod events;
pub mod metrics;
pub mod notifications;
pub mod rydz;
pub mod users;
