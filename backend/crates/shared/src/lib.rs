//! Shared Kernel - Domain-crossing minimal core
//!
//! Vocabulary shared by every backend crate:
//! - Unified error type, error kinds and result alias
//! - Typed identifiers
//!
//! Only things with the same meaning in every domain belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
