//! Core chat components
//!
//! Category detection, the per-session turn controller and the registry of
//! live sessions.

mod classifier;
mod registry;
mod session;

pub use registry::SessionRegistry;
pub use session::{Acknowledgement, PendingTurn, SessionEvent, SessionHandle, SessionSnapshot};
