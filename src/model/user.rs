//! `User` and its presence status, grounded in `original_source/core/models.py::User`
//! and `UserStatus`, reshaped into the teacher's `from_db_row`/`to_db_values` style
//! (see `repository::user_repo`) since the live `detail` field has no DB column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::UserDetail;

/// Fine-grained presence state, per spec. Not a DB column (spec.md §6's
/// `User` row has no `substatus` field — a freshly loaded user starts
/// `Offline` until a live session sets it via `me_update`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Substatus {
    Offline = 0,
    Online = 1,
    Busy = 2,
    Idle = 3,
    Brb = 4,
    Away = 5,
    OnPhone = 6,
    OutToLunch = 7,
    Invisible = 8,
    NotAtHome = 9,
    NotAtDesk = 10,
    NotInOffice = 11,
    OnVacation = 12,
    SteppedOut = 13,
}

impl Substatus {
    pub fn from_i16(value: i16) -> Self {
        match value {
            1 => Substatus::Online,
            2 => Substatus::Busy,
            3 => Substatus::Idle,
            4 => Substatus::Brb,
            5 => Substatus::Away,
            6 => Substatus::OnPhone,
            7 => Substatus::OutToLunch,
            8 => Substatus::Invisible,
            9 => Substatus::NotAtHome,
            10 => Substatus::NotAtDesk,
            11 => Substatus::NotInOffice,
            12 => Substatus::OnVacation,
            13 => Substatus::SteppedOut,
            _ => Substatus::Offline,
        }
    }

    pub fn to_i16(self) -> i16 {
        self as i16
    }

    /// Substatuses that look offline to observers subject to `is_blocking`.
    pub fn is_offlineish(self) -> bool {
        matches!(self, Substatus::Offline | Substatus::Invisible)
    }
}

/// A status message; `persistent` controls whether `message` is written back
/// to the DB on the next `save_batch`, per spec.md §4.1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub persistent: bool,
}

/// `UserStatus`: the presence information carried by a `User` and copied,
/// field-by-field, into observers' `Contact::status` by
/// `compute_visible_status` (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatus {
    pub substatus: Substatus,
    pub name: String,
    pub message: StatusMessage,
    pub media: Option<String>,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self {
            substatus: Substatus::Offline,
            name: String::new(),
            message: StatusMessage::default(),
            media: None,
        }
    }
}

impl UserStatus {
    /// The status text actually worth persisting: empty when the current
    /// message was marked non-persistent (spec.md §4.1 `save_batch`).
    pub fn persisted_message(&self) -> &str {
        if self.message.persistent {
            &self.message.text
        } else {
            ""
        }
    }

    pub fn set_status_message(&mut self, text: String, persistent: bool) {
        self.message = StatusMessage { text, persistent };
    }
}

/// Federated network a contact belongs to. Only `WindowsLive` is reachable
/// from this core (no SOAP/Yahoo federation adapter ships here), but the
/// type stays open so adapters can round-trip values this core never
/// interprets (see `original_source/core/models.py::NetworkID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkID {
    WindowsLive,
    Yahoo,
    Other(u8),
}

/// A registered user. Owned solely by the process-wide `user_by_uuid` arena
/// (spec.md §9 Design Notes); every other reference is a `uuid` handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub verified: bool,
    pub status: UserStatus,
    /// Well-known keys: `BLP` ∈ {`AL`, `BL`}, `gtc`; others opaque.
    pub settings: Value,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub date_login: Option<DateTime<Utc>>,
    /// Relay flag carried from the original schema (front-end hint; unused
    /// by the core itself).
    pub relay: bool,
    /// Protocol-specific credential blobs, addressed as `(service, key)`,
    /// e.g. `msn.pw_md5`. Never serialized back to adapters.
    #[serde(skip)]
    pub front_data: Value,
    /// Attached while the user is loaded (spec.md §3 Lifecycles); `None`
    /// once the last session of this user logs out.
    #[serde(skip)]
    pub detail: Option<UserDetail>,
}

impl User {
    pub fn new(id: i64, uuid: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            uuid,
            email,
            verified: false,
            status: UserStatus::default(),
            settings: Value::Object(serde_json::Map::new()),
            date_created: now,
            date_modified: now,
            date_login: None,
            relay: false,
            front_data: Value::Object(serde_json::Map::new()),
            detail: None,
        }
    }

    /// Block-list policy for this user, defaulted to `AL` (allow) per
    /// spec.md §6 Configuration.
    pub fn blp(&self) -> &str {
        self.settings
            .get("BLP")
            .and_then(Value::as_str)
            .unwrap_or("AL")
    }

    pub fn touch_login(&mut self, at: DateTime<Utc>) {
        self.date_login = Some(at);
    }
}
