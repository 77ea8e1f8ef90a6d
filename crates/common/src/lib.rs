//! # Tutorlane Common
//!
//! Reusable primitives with no domain knowledge.
//!
//! Currently this is the encryption service used for OAuth-token-at-rest
//! protection; higher-level key management (where keys come from, rotation
//! policy) belongs to the deployment environment.

pub mod crypto;
pub mod error;

pub use crypto::encryption::{EncryptedData, EncryptionService};
pub use error::{CommonError, CommonResult};
