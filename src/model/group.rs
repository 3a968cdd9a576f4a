//! Per-user contact group, grounded in `original_source/core/models.py::Group`
//! and reshaped in the teacher's `Group` (model/group.rs) field-naming idiom.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum group name length, per spec.md §6 Configuration.
pub const MAX_GROUP_NAME_LENGTH: usize = 61;

/// Reserved id for the implicit "ungrouped" bucket; never created or
/// deleted (spec.md I4).
pub const UNGROUPED_ID: &str = "0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub uuid: String,
    pub name: String,
    pub is_favorite: bool,
    pub date_modified: DateTime<Utc>,
}

impl Group {
    pub fn new(id: String, uuid: String, name: String) -> Self {
        Self {
            id,
            uuid,
            name,
            is_favorite: false,
            date_modified: Utc::now(),
        }
    }
}
