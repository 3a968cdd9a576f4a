//! `Contact`, the directed edge from an owning user to another user,
//! grounded in `original_source/core/models.py::Contact` /
//! `ContactGroupEntry` / `ContactInfo` / `ContactLocation`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::user::UserStatus;

/// Bit-flags on a contact edge (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lst(u8);

impl Lst {
    pub const FL: Lst = Lst(1);
    pub const AL: Lst = Lst(2);
    pub const BL: Lst = Lst(4);
    pub const RL: Lst = Lst(8);
    pub const PL: Lst = Lst(16);
    pub const NONE: Lst = Lst(0);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        Lst(bits)
    }

    pub fn contains(self, other: Lst) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Lst) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Lst) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Lst {
    type Output = Lst;
    fn bitor(self, rhs: Lst) -> Lst {
        Lst(self.0 | rhs.0)
    }
}

/// A `(contact_uuid, group_id, group_uuid)` membership entry. Equality and
/// hashing follow all three fields, matching the original's
/// `ContactGroupEntry`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactGroupEntry {
    pub contact_uuid: String,
    pub group_id: String,
    pub group_uuid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactLocation {
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zipcode: Option<String>,
}

/// Address-book style metadata for a contact, column-for-column with
/// spec.md §6's `UserContact` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub birthdate: Option<DateTime<Utc>>,
    pub anniversary: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub primary_email_type: Option<String>,
    pub personal_email: Option<String>,
    pub work_email: Option<String>,
    pub im_email: Option<String>,
    pub other_email: Option<String>,
    pub home_phone: Option<String>,
    pub work_phone: Option<String>,
    pub fax_phone: Option<String>,
    pub pager_phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub other_phone: Option<String>,
    pub personal_website: Option<String>,
    pub business_website: Option<String>,
    pub locations: Vec<ContactLocation>,
}

/// Directed edge from an owning `User` to another user (`head`), identified
/// by the head's uuid — a handle, not an owning reference (spec.md §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub head: String,
    pub lists: Lst,
    pub groups: std::collections::HashSet<ContactGroupEntry>,
    /// Observer-visible status, recomputed on every presence change by
    /// `compute_visible_status` — never stored independently (spec.md I5).
    pub status: UserStatus,
    pub info: ContactInfo,
    pub is_favorite: bool,
    /// Address-book flag: whether this contact is itself a Messenger user
    /// (vs. an email-only address-book entry), patchable via `contact_edit`
    /// (spec.md §4.6). Defaults `true`, matching `original_source`'s
    /// `abservice.py` default for contacts added through the roster.
    pub is_messenger_user: bool,
}

impl Contact {
    pub fn new(head: String, display_name: String) -> Self {
        let mut status = UserStatus::default();
        status.name = display_name;
        Self {
            head,
            lists: Lst::NONE,
            groups: std::collections::HashSet::new(),
            status,
            info: ContactInfo::default(),
            is_favorite: false,
            is_messenger_user: true,
        }
    }

    pub fn is_in_group_id(&self, group_id: &str) -> bool {
        self.groups.iter().any(|g| g.group_id == group_id)
    }

    pub fn add_group(&mut self, group_id: String, group_uuid: String) {
        self.groups.insert(ContactGroupEntry {
            contact_uuid: self.head.clone(),
            group_id,
            group_uuid,
        });
        // I4: group membership implies FL.
        self.lists.insert(Lst::FL);
    }

    /// Removes the membership entry matching `group_id`, discarding the
    /// *found* entry — not a stray loop variable (spec.md §9 Open Question:
    /// the original's `remove_from_group` discards the outer-scope loop
    /// variable instead).
    pub fn remove_from_group(&mut self, group_id: &str) -> bool {
        if let Some(found) = self
            .groups
            .iter()
            .find(|g| g.group_id == group_id)
            .cloned()
        {
            self.groups.remove(&found);
            true
        } else {
            false
        }
    }
}
