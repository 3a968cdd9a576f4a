use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::error::StorageError;
use crate::model::contact::{Contact, ContactGroupEntry, ContactInfo, Lst};
use crate::model::group::Group;
use crate::model::user::{Substatus, User, UserStatus};

/// Thin sqlx façade over the three tables from spec.md §6
/// (`User`, `UserGroup`, `UserContact`). `UserService` is the only caller;
/// this type hides schema details from the rest of the core. `Clone` is
/// cheap (`PgPool` is an `Arc` handle internally) and lets
/// `UserService::update_date_login` hand an owned copy to a detached
/// `tokio::spawn` task.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_uuid(&self, uuid: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            "SELECT id, uuid, email, verified, name, message, settings, \
             date_created, date_modified, date_login, relay, front_data \
             FROM users WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            "SELECT id, uuid, email, verified, name, message, settings, \
             date_created, date_modified, date_login, relay, front_data \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    pub async fn touch_login(&self, uuid: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        sqlx::query("UPDATE users SET date_login = $1 WHERE uuid = $2")
            .bind(at)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn groups_for_user(&self, user_id: i64) -> Result<Vec<Group>, StorageError> {
        let rows = sqlx::query(
            "SELECT group_id, group_uuid, name, is_favorite, date_modified \
             FROM user_groups WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Group {
                id: r.get::<String, _>("group_id"),
                uuid: r.get::<String, _>("group_uuid"),
                name: r.get::<String, _>("name"),
                is_favorite: r.get::<bool, _>("is_favorite"),
                date_modified: r.get::<DateTime<Utc>, _>("date_modified"),
            })
            .collect())
    }

    pub async fn contacts_for_user(&self, user_id: i64) -> Result<Vec<(String, Contact)>, StorageError> {
        let rows = sqlx::query(
            "SELECT contact_uuid, name, lists, groups, display_name, first_name, \
             middle_name, last_name, nickname, birthdate, anniversary, notes, \
             primary_email_type, personal_email, work_email, im_email, other_email, \
             home_phone, work_phone, fax_phone, pager_phone, mobile_phone, other_phone, \
             personal_website, business_website, locations \
             FROM user_contacts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let head: String = r.get("contact_uuid");
            let mut contact = Contact::new(head.clone(), r.get::<String, _>("name"));
            contact.lists = Lst::from_bits(r.get::<i32, _>("lists") as u8);

            let groups_json: Value = r.get("groups");
            if let Value::Array(items) = groups_json {
                for item in items {
                    if let (Some(id), Some(uuid)) = (
                        item.get("id").and_then(Value::as_str),
                        item.get("uuid").and_then(Value::as_str),
                    ) {
                        contact.groups.insert(ContactGroupEntry {
                            contact_uuid: head.clone(),
                            group_id: id.to_string(),
                            group_uuid: uuid.to_string(),
                        });
                    }
                }
            }

            contact.info = ContactInfo {
                display_name: r.get("display_name"),
                first_name: r.get("first_name"),
                middle_name: r.get("middle_name"),
                last_name: r.get("last_name"),
                nickname: r.get("nickname"),
                birthdate: r.get("birthdate"),
                anniversary: r.get("anniversary"),
                notes: r.get("notes"),
                primary_email_type: r.get("primary_email_type"),
                personal_email: r.get("personal_email"),
                work_email: r.get("work_email"),
                im_email: r.get("im_email"),
                other_email: r.get("other_email"),
                home_phone: r.get("home_phone"),
                work_phone: r.get("work_phone"),
                fax_phone: r.get("fax_phone"),
                pager_phone: r.get("pager_phone"),
                mobile_phone: r.get("mobile_phone"),
                other_phone: r.get("other_phone"),
                personal_website: r.get("personal_website"),
                business_website: r.get("business_website"),
                locations: serde_json::from_value(r.get::<Value, _>("locations")).unwrap_or_default(),
            };

            out.push((head, contact));
        }
        Ok(out)
    }

    /// Upserts `user` + its groups/contacts and deletes rows no longer
    /// present, in one transaction (spec.md §4.1 `save_batch`, idempotent
    /// per spec.md P5).
    pub async fn save_batch(
        &self,
        entries: &[(User, crate::model::UserDetail)],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        for (user, detail) in entries {
            sqlx::query(
                "INSERT INTO users (id, uuid, email, verified, name, message, settings, \
                 date_created, date_modified, date_login, relay, front_data) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12) \
                 ON CONFLICT (uuid) DO UPDATE SET \
                 email = EXCLUDED.email, verified = EXCLUDED.verified, name = EXCLUDED.name, \
                 message = EXCLUDED.message, settings = EXCLUDED.settings, \
                 date_modified = EXCLUDED.date_modified, date_login = EXCLUDED.date_login",
            )
            .bind(user.id)
            .bind(&user.uuid)
            .bind(&user.email)
            .bind(user.verified)
            .bind(&user.status.name)
            .bind(user.status.persisted_message())
            .bind(&user.settings)
            .bind(user.date_created)
            .bind(Utc::now())
            .bind(user.date_login)
            .bind(user.relay)
            .bind(&user.front_data)
            .execute(&mut *tx)
            .await?;

            let keep_group_ids: HashSet<&str> =
                detail.groups().map(|g| g.id.as_str()).collect();
            let existing_groups = sqlx::query("SELECT group_id FROM user_groups WHERE user_id = $1")
                .bind(user.id)
                .fetch_all(&mut *tx)
                .await?;
            for row in existing_groups {
                let gid: String = row.get("group_id");
                if !keep_group_ids.contains(gid.as_str()) {
                    sqlx::query("DELETE FROM user_groups WHERE user_id = $1 AND group_id = $2")
                        .bind(user.id)
                        .bind(&gid)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            for group in detail.groups() {
                sqlx::query(
                    "INSERT INTO user_groups (user_id, group_id, group_uuid, name, is_favorite, date_modified) \
                     VALUES ($1,$2,$3,$4,$5,$6) \
                     ON CONFLICT (user_id, group_id, group_uuid) DO UPDATE SET \
                     name = EXCLUDED.name, is_favorite = EXCLUDED.is_favorite, date_modified = EXCLUDED.date_modified",
                )
                .bind(user.id)
                .bind(&group.id)
                .bind(&group.uuid)
                .bind(&group.name)
                .bind(group.is_favorite)
                .bind(group.date_modified)
                .execute(&mut *tx)
                .await?;
            }

            let keep_contact_uuids: HashSet<&str> =
                detail.contacts.keys().map(String::as_str).collect();
            let existing_contacts =
                sqlx::query("SELECT contact_uuid FROM user_contacts WHERE user_id = $1")
                    .bind(user.id)
                    .fetch_all(&mut *tx)
                    .await?;
            for row in existing_contacts {
                let cuuid: String = row.get("contact_uuid");
                if !keep_contact_uuids.contains(cuuid.as_str()) {
                    sqlx::query("DELETE FROM user_contacts WHERE user_id = $1 AND contact_uuid = $2")
                        .bind(user.id)
                        .bind(&cuuid)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            for (contact_uuid, contact) in &detail.contacts {
                let groups_json = serde_json::to_value(
                    contact
                        .groups
                        .iter()
                        .map(|g| serde_json::json!({"id": g.group_id, "uuid": g.group_uuid}))
                        .collect::<Vec<_>>(),
                )
                .unwrap_or(Value::Array(vec![]));
                let locations_json =
                    serde_json::to_value(&contact.info.locations).unwrap_or(Value::Array(vec![]));

                sqlx::query(
                    "INSERT INTO user_contacts (user_id, contact_uuid, name, lists, groups, \
                     display_name, first_name, middle_name, last_name, nickname, birthdate, \
                     anniversary, notes, primary_email_type, personal_email, work_email, \
                     im_email, other_email, home_phone, work_phone, fax_phone, pager_phone, \
                     mobile_phone, other_phone, personal_website, business_website, locations) \
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24,$25,$26,$27) \
                     ON CONFLICT (user_id, contact_uuid) DO UPDATE SET \
                     name = EXCLUDED.name, lists = EXCLUDED.lists, groups = EXCLUDED.groups, \
                     display_name = EXCLUDED.display_name",
                )
                .bind(user.id)
                .bind(contact_uuid)
                .bind(&contact.status.name)
                .bind(contact.lists.bits() as i32)
                .bind(groups_json)
                .bind(&contact.info.display_name)
                .bind(&contact.info.first_name)
                .bind(&contact.info.middle_name)
                .bind(&contact.info.last_name)
                .bind(&contact.info.nickname)
                .bind(contact.info.birthdate)
                .bind(contact.info.anniversary)
                .bind(&contact.info.notes)
                .bind(&contact.info.primary_email_type)
                .bind(&contact.info.personal_email)
                .bind(&contact.info.work_email)
                .bind(&contact.info.im_email)
                .bind(&contact.info.other_email)
                .bind(&contact.info.home_phone)
                .bind(&contact.info.work_phone)
                .bind(&contact.info.fax_phone)
                .bind(&contact.info.pager_phone)
                .bind(&contact.info.mobile_phone)
                .bind(&contact.info.other_phone)
                .bind(&contact.info.personal_website)
                .bind(&contact.info.business_website)
                .bind(locations_json)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
    let mut status = UserStatus::default();
    status.name = row.get::<String, _>("name");
    status.message.text = row.get::<String, _>("message");
    status.message.persistent = !status.message.text.is_empty();
    status.substatus = Substatus::Offline;

    User {
        id: row.get::<i64, _>("id"),
        uuid: row.get::<String, _>("uuid"),
        email: row.get::<String, _>("email"),
        verified: row.get::<bool, _>("verified"),
        status,
        settings: row.get::<Value, _>("settings"),
        date_created: row.get::<DateTime<Utc>, _>("date_created"),
        date_modified: row.get::<DateTime<Utc>, _>("date_modified"),
        date_login: row.get::<Option<DateTime<Utc>>, _>("date_login"),
        relay: row.get::<bool, _>("relay"),
        front_data: row.get::<Value, _>("front_data"),
        detail: None,
    }
}
