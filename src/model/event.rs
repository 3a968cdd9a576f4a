//! Event kinds dispatched to `Session::send_event`, modeled as a tagged
//! union rather than a subclass hierarchy (spec.md §9 Design Notes).
//! `LoginOption` supplements the distilled spec from
//! `original_source/core/models.py::LoginOption`.

use serde::{Deserialize, Serialize};

use crate::model::contact::Contact;
use crate::model::user::User;

/// Switchboard host/port, exposed to adapters via `sb_token_create` and
/// `notify_call` (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
}

/// Controls session-eviction behavior at login time. Carried over from
/// `original_source` and wired into `_login_common` (SPEC_FULL.md §3):
/// `Duplicate` (default) leaves prior sessions untouched; `NotifyOthers`
/// leaves them connected but informs them a new endpoint signed in;
/// `BootOthers` evicts every other live session of the same user before the
/// new one is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoginOption {
    #[default]
    Duplicate,
    NotifyOthers,
    BootOthers,
}

/// Events a front-end adapter receives on behalf of a `Session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// An observed contact's visible status changed.
    PresenceNotification { contact: Contact },
    /// `user` added the session's owner to `lst` (used for the `RL` mirror
    /// notification on `contact_add FL`).
    AddedToList { lst: super::contact::Lst, user: User },
    /// Invitation into a switchboard multi-party chat.
    InvitedToChat {
        sb_address: ServiceAddress,
        chatid: String,
        token: String,
        caller: User,
    },
    ChatParticipantJoined { chatid: String, user: User },
    ChatParticipantLeft { chatid: String, user: User },
    ChatMessage { chatid: String, from: User, text: String },
    ContactRequestDenied { by: User, message: Option<String> },
    /// This session was evicted by a `BootOthers` login elsewhere.
    PopBoot,
    /// Informational: another endpoint of this user signed in
    /// (`NotifyOthers`), this session was not evicted.
    PopNotify,
}
