//! The only component that reads or writes the persistent user store
//! (spec.md §4.1), grounded in `original_source/core/user.py`'s
//! `UserService` and the teacher's `offline::storage` filesystem-write
//! idiom (write-to-temp, then rename, for atomicity).

use std::path::{Path, PathBuf};

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::auth::Credentials;
use crate::error::{CoreError, Result, StorageError};
use crate::model::oim::Oim;
use crate::model::user::User;
use crate::model::UserDetail;
use crate::repository::UserRepository;

pub struct UserService {
    repo: UserRepository,
    /// Cache of DB-loaded `User` records, keyed by uuid (spec.md I6: "single
    /// in-memory instance per uuid" as seen by this service's own reads —
    /// the live, detail-carrying instance is owned by `NotificationCore`'s
    /// arena, per spec.md §9).
    cache: DashMap<String, User>,
    /// Short-lived MD5 challenge salts, keyed by email.
    pending_salts: DashMap<String, String>,
    oim_root: PathBuf,
}

impl UserService {
    pub fn new(pool: PgPool, oim_root: impl Into<PathBuf>) -> Self {
        Self {
            repo: UserRepository::new(pool),
            cache: DashMap::new(),
            pending_salts: DashMap::new(),
            oim_root: oim_root.into(),
        }
    }

    /// Verifies the stored password hash; returns the uuid or `None` on
    /// failure. Read misses (unknown email) and hash mismatches both yield
    /// `None` — login failure is reported via `Option`, not an error
    /// (spec.md §4.1, §7).
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<String>> {
        let Some(user) = self.load_by_email(email).await? else {
            return Ok(None);
        };
        let hash = user
            .front_data
            .get("modern")
            .and_then(|v| v.get("password_hash"))
            .and_then(Value::as_str);
        match hash {
            Some(hash) if Credentials::verify_password(password, hash) => Ok(Some(user.uuid)),
            _ => Ok(None),
        }
    }

    /// Resolves a uuid from an email address (`util_get_uuid_from_email`,
    /// spec.md §6), e.g. for `NotificationCore::notify_call`.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.load_by_email(email).await
    }

    /// Returns `None` on unknown email rather than failing, to avoid
    /// account enumeration (spec.md §4.1).
    pub async fn get_md5_salt(&self, email: &str) -> Result<Option<String>> {
        if self.load_by_email(email).await?.is_none() {
            return Ok(None);
        }
        let salt = Credentials::generate_md5_salt();
        self.pending_salts.insert(email.to_string(), salt.clone());
        Ok(Some(salt))
    }

    pub async fn login_md5(&self, email: &str, hex_hash: &str) -> Result<Option<String>> {
        let Some(user) = self.load_by_email(email).await? else {
            return Ok(None);
        };
        let Some((_, salt)) = self.pending_salts.remove(email) else {
            return Ok(None);
        };
        let unsalted = user
            .front_data
            .get("msn")
            .and_then(|v| v.get("pw_md5_unsalted"))
            .and_then(Value::as_str);
        let Some(unsalted) = unsalted else {
            return Ok(None);
        };
        let expected = Credentials::md5_challenge_response(&salt, unsalted);
        if expected == hex_hash {
            Ok(Some(user.uuid))
        } else {
            Ok(None)
        }
    }

    /// Fire-and-forget: the caller does not await persistence, but the
    /// write itself still happens — failures are logged, never propagated.
    pub fn update_date_login(&self, uuid: &str) {
        let now = Utc::now();
        if let Some(mut entry) = self.cache.get_mut(uuid) {
            entry.touch_login(now);
        }
        let repo = self.repo.clone();
        let uuid = uuid.to_string();
        tokio::spawn(async move {
            if let Err(e) = repo.touch_login(&uuid, now).await {
                warn!(uuid = %uuid, error = %e, "failed to persist date_login");
            }
        });
    }

    pub async fn get(&self, uuid: &str) -> Result<Option<User>> {
        if let Some(user) = self.cache.get(uuid) {
            return Ok(Some(user.clone()));
        }
        let Some(user) = self.repo.find_by_uuid(uuid).await.map_err(StorageError::from)? else {
            return Ok(None);
        };
        self.cache.insert(uuid.to_string(), user.clone());
        Ok(Some(user))
    }

    /// Rebuilds the full `UserDetail` by joining group rows and contact
    /// rows; the caller (`NotificationCore::_login_common`) is responsible
    /// for recursively resolving each contact's `User` via `get`.
    pub async fn get_detail(&self, uuid: &str) -> Result<Option<UserDetail>> {
        let Some(user) = self.get(uuid).await? else {
            return Ok(None);
        };

        let groups = self
            .repo
            .groups_for_user(user.id)
            .await
            .map_err(StorageError::from)?;
        let contacts = self
            .repo
            .contacts_for_user(user.id)
            .await
            .map_err(StorageError::from)?;

        let mut detail = UserDetail::new();
        for group in groups {
            detail.insert_group(group);
        }
        for (head, contact) in contacts {
            detail.contacts.insert(head, contact);
        }
        Ok(Some(detail))
    }

    /// Upserts in one transaction per batch. Idempotent (spec.md P5).
    /// Exceptions are caught and logged by the caller (the persistence
    /// pump) so it keeps running.
    pub async fn save_batch(&self, entries: &[(User, UserDetail)]) -> Result<()> {
        self.repo
            .save_batch(entries)
            .await
            .map_err(StorageError::from)?;
        for (user, _) in entries {
            self.cache.insert(user.uuid.clone(), user.clone());
        }
        Ok(())
    }

    fn recipient_dir(&self, recipient_uuid: &str) -> PathBuf {
        self.oim_root.join(recipient_uuid)
    }

    pub async fn get_oim_batch(&self, recipient_uuid: &str) -> Result<Vec<Oim>> {
        let dir = self.recipient_dir(recipient_uuid);
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(CoreError::from(StorageError::from(e))),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(StorageError::from)?
        {
            let bytes = tokio::fs::read(entry.path()).await.map_err(StorageError::from)?;
            match serde_json::from_slice::<Oim>(&bytes) {
                Ok(oim) => out.push(oim),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping malformed OIM file"),
            }
        }
        Ok(out)
    }

    /// Returns the OIM when the file exists, `None` otherwise (spec.md §9
    /// Open Question: the original inverts this condition).
    pub async fn get_oim_single(
        &self,
        recipient_uuid: &str,
        oim_uuid: &str,
        mark_read: bool,
    ) -> Result<Option<Oim>> {
        let path = self.recipient_dir(recipient_uuid).join(oim_uuid);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await.map_err(StorageError::from)?;
        let mut oim: Oim = serde_json::from_slice(&bytes).map_err(StorageError::from)?;
        if mark_read && !oim.is_read {
            oim.is_read = true;
            self.write_oim_file(&path, &oim).await?;
        }
        Ok(Some(oim))
    }

    pub async fn save_oim(&self, recipient_uuid: &str, mut oim: Oim) -> Result<Oim> {
        if oim.uuid.is_empty() {
            oim.uuid = Uuid::new_v4().to_string().to_uppercase();
        }
        let dir = self.recipient_dir(recipient_uuid);
        tokio::fs::create_dir_all(&dir).await.map_err(StorageError::from)?;
        let path = dir.join(&oim.uuid);
        self.write_oim_file(&path, &oim).await?;
        Ok(oim)
    }

    pub async fn delete_oim(&self, recipient_uuid: &str, oim_uuid: &str) -> Result<()> {
        let path = self.recipient_dir(recipient_uuid).join(oim_uuid);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::from(StorageError::from(e))),
        }
    }

    /// Write-to-temp-then-rename: prevents `get_oim_single` from observing
    /// a partially written file (spec.md §9 "OIM storage race").
    async fn write_oim_file(&self, path: &Path, oim: &Oim) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(oim).map_err(StorageError::from)?;
        tokio::fs::write(&tmp_path, &bytes).await.map_err(StorageError::from)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(StorageError::from)?;
        Ok(())
    }

    async fn load_by_email(&self, email: &str) -> Result<Option<User>> {
        if let Some(user) = self.cache.iter().find(|e| e.value().email == email) {
            return Ok(Some(user.value().clone()));
        }
        let Some(user) = self
            .repo
            .find_by_email(email)
            .await
            .map_err(StorageError::from)?
        else {
            return Ok(None);
        };
        self.cache.insert(user.uuid.clone(), user.clone());
        Ok(Some(user))
    }
}
