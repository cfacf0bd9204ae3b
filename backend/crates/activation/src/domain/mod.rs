//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - The activation code codec
//! - Domain entities (CodeRecord, Activation, BannedDevice, ...)
//! - Domain value objects (DeviceId, CodeStatus, FailureReason)
//! - Domain services (fraud policy, expiry, tokens)
//! - Repository traits (interfaces)

pub mod codec;
pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
