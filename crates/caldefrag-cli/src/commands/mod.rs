pub mod candidates;
pub mod config;
pub mod cost;
pub mod scenario;
pub mod solve;
pub mod working_hours;
