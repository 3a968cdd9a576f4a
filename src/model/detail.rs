//! `UserDetail`: groups + contacts attached to a loaded `User`.
//! Grounded in `original_source/core/models.py::UserDetail`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::contact::Contact;
use crate::model::group::{Group, MAX_GROUP_NAME_LENGTH, UNGROUPED_ID};

/// Owned exclusively by its `User` (spec.md I6: at most one `UserDetail`
/// instance per `User` exists in memory).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDetail {
    groups_by_id: HashMap<String, Group>,
    groups_by_uuid: HashMap<String, String>,
    /// Contact-user-uuid → `Contact`.
    pub contacts: HashMap<String, Contact>,
}

impl UserDetail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups_by_id.values()
    }

    pub fn get_group_by_id(&self, id: &str) -> Option<&Group> {
        self.groups_by_id.get(id)
    }

    pub fn get_group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups_by_id.values().find(|g| g.name == name)
    }

    pub fn insert_group(&mut self, group: Group) {
        self.groups_by_uuid
            .insert(group.uuid.clone(), group.id.clone());
        self.groups_by_id.insert(group.id.clone(), group);
    }

    pub fn delete_group(&mut self, id: &str) -> Option<Group> {
        let group = self.groups_by_id.remove(id)?;
        self.groups_by_uuid.remove(&group.uuid);
        Some(group)
    }

    /// Smallest positive integer, as a decimal string, not currently in use
    /// as a group id (mirrors `original_source`'s `_gen_group_id`; never
    /// returns `"0"`, the reserved ungrouped id — spec.md P6).
    pub fn gen_group_id(&self) -> String {
        let mut candidate: u64 = 1;
        loop {
            let id = candidate.to_string();
            if id != UNGROUPED_ID && !self.groups_by_id.contains_key(&id) {
                return id;
            }
            candidate += 1;
        }
    }

    pub fn validate_group_name(&self, name: &str, ignore_id: Option<&str>) -> Result<(), crate::error::CoreError> {
        if name.len() > MAX_GROUP_NAME_LENGTH {
            return Err(crate::error::CoreError::GroupNameTooLong {
                max: MAX_GROUP_NAME_LENGTH,
            });
        }
        if name == "(No Group)" {
            return Err(crate::error::CoreError::GroupAlreadyExists);
        }
        let duplicate = self
            .groups_by_id
            .values()
            .any(|g| g.name == name && Some(g.id.as_str()) != ignore_id);
        if duplicate {
            return Err(crate::error::CoreError::GroupAlreadyExists);
        }
        Ok(())
    }

    /// Scrub `group_id` from every contact's membership set (used by
    /// `group_remove`, spec.md §4.6).
    pub fn scrub_group_from_contacts(&mut self, group_id: &str) {
        for contact in self.contacts.values_mut() {
            contact.remove_from_group(group_id);
        }
    }
}
