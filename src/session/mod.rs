//! Sessions and the session registry (spec.md §4.3), grounded in the
//! teacher's `infra::session_manager::SessionManager` (`Arc<RwLock<HashMap>>`
//! shape) but reworked for the spec's two-index, many-sessions-per-user model.

pub mod registry;
pub mod session;

pub use registry::SessionRegistry;
pub use session::{Session, SessionId, SessionState};
