//! API handlers module

pub mod centers;
pub mod domains;
pub mod health;
pub mod sample_results;
pub mod samples;
pub mod users;
