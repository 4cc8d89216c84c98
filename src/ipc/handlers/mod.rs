pub mod analytics;
pub mod attendance;
pub mod auth;
pub mod booking;
pub mod core;
pub mod students;
pub mod waitlist;
