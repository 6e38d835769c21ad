//! Services layer - Business logic
//!
//! Window evaluation, token rotation, QR rendering and the background sweep.
//! Services depend on repository traits, never on a concrete store.

pub mod attendance;
pub mod clock;
pub mod qr;
pub mod sweep;
pub mod token;
pub mod window;

pub use attendance::{AttendanceError, AttendanceService};
pub use clock::{to_local, Clock, ManualClock, SystemClock};
pub use qr::QrRenderer;
pub use sweep::SessionSweeper;
pub use token::{generate_token, QrSubject, TokenRotator, TOKEN_LENGTH};
pub use window::{close_if_expired, evaluate, Evaluation, WindowPolicy, WindowStatus};
