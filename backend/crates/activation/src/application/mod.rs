//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure.

pub mod activate;
pub mod analytics;
pub mod config;
pub mod generate_batch;
pub mod manage_codes;
pub mod manage_fraud;
