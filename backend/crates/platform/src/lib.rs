//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations with no domain knowledge:
//! - Cryptographic utilities (OS randomness, SHA-256, HMAC, hex/base64)
//! - Client identification from HTTP headers

pub mod client;
pub mod crypto;
