//! Data models
//!
//! Records read and written by the attendance service:
//! - `Session`: stored attendance window with its rotating token
//! - `ClassToken`: token issued for a class with a request-supplied duration

mod class_token;
mod session;

pub use class_token::ClassToken;
pub use session::Session;
