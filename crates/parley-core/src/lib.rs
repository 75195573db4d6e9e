//! The authorization and message/conversation consistency core.
//!
//! Every mutating operation resolves the caller's session token, checks
//! participation against the owning conversation, and applies its writes
//! inside one storage transaction, so the authorization check and the
//! mutation cannot be separated by a concurrent writer.

pub mod authz;
pub mod conversations;
pub mod error;
pub mod identity;
pub mod media;
pub mod messages;
pub mod photos;
pub mod reactions;

pub use error::{CoreError, CoreResult};
