//! Activation Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Code codec, entities, fraud policy, repository traits
//! - `application/` - Use cases
//! - `infra/` - PostgreSQL and in-memory implementations
//! - `presentation/` - HTTP handlers
//!
//! ## Security Model
//! - A code's checksum only proves it is well-formed and untampered; the
//!   persisted record decides whether it can still be used
//! - A code moves from available to used at most once, enforced by a
//!   conditional update in persistence
//! - Device state (clean or banned) is derived from the failed attempt log
//!   and the ban table, never from client-supplied values
//! - Activation tokens are capability hints, not credentials

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::ActivationConfig;
pub use domain::codec::{CodeCodec, CodecError};
pub use error::{ActivationError, ActivationResult};
pub use infra::memory::InMemoryActivationRepository;
pub use infra::postgres::PgActivationRepository;
pub use presentation::router::{activation_router, activation_router_generic, unavailable_router};

#[cfg(test)]
mod tests;
