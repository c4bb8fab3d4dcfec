pub mod approval;
pub mod auth;
pub mod event;
pub mod notification;
pub mod ryd;
pub mod user;
