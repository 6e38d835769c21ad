//! Database repositories
//!
//! Each repository exposes the narrow set of reads and writes the attendance
//! services need, behind a trait so tests and services share one seam.

pub mod class_token;
pub mod session;

pub use class_token::{ClassTokenRepository, SqlxClassTokenRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
