//! The orchestration layer: login/logout lifecycle, presence visibility and
//! fan-out, roster mutations, switchboard brokering, and the persistence
//! pump (spec.md §4.4-§4.9). Grounded in the teacher's
//! `infra::presence_manager`/`infra::session_manager` concurrency shape,
//! generalized to the single-logical-mutex model recorded in SPEC_FULL.md
//! §5.

pub mod notification_core;

pub use notification_core::{ContactEdit, MeUpdate, NotificationCore, PumpHandle};
