pub mod auth;
pub mod core;
pub mod progress;
pub mod reports;
pub mod responses;
pub mod roster;
pub mod topics;
