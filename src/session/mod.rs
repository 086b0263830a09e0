//! Authentication session: in-memory state, the shared context read by the
//! HTTP pipeline, and the manager that drives the state machine.

mod context;
mod manager;
mod state;

pub(crate) use context::SessionContext;
pub use manager::SessionManager;
pub use state::{AuthPhase, Session};
