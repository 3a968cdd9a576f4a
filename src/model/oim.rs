//! Offline Instant Message, grounded in `original_source/core/models.py::OIM`
//! and the on-disk schema in spec.md §6.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Text,
    Nudge,
    Typing,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OimFriendly {
    pub friendly_name: String,
    pub encoding: String,
    pub charset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OimMessageBody {
    pub text: String,
    pub utf8: bool,
}

/// Identified by `uuid`; stored as one JSON file per message under
/// `storage/oim/<recipient_uuid>/<oim_uuid>` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Oim {
    pub uuid: String,
    pub run_id: String,
    pub from_email: String,
    pub from_friendly: OimFriendly,
    pub from_user_id: i64,
    pub to_email: String,
    pub is_read: bool,
    pub sent: DateTime<Utc>,
    pub origin_ip: String,
    pub oim_proxy: String,
    pub headers: String,
    pub message: OimMessageBody,
}
