//! In-memory `UserStore` double, so the scenarios in `notification_core_test.rs`
//! run without a live Postgres instance (SPEC_FULL.md §8).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use privchat_core::error::Result;
use privchat_core::model::{Oim, User, UserDetail};
use privchat_core::service::UserStore;

#[derive(Default)]
pub struct FakeUserStore {
    users: Mutex<HashMap<String, User>>,
    details: Mutex<HashMap<String, UserDetail>>,
    passwords: Mutex<HashMap<String, String>>,
    pub saved_batches: Mutex<Vec<(User, UserDetail)>>,
}

impl FakeUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with a plaintext test password (this double skips
    /// `Credentials` entirely, it only needs to satisfy `UserStore`).
    pub fn seed(&self, user: User, detail: UserDetail, password: &str) {
        self.passwords
            .lock()
            .unwrap()
            .insert(user.email.clone(), password.to_string());
        self.details
            .lock()
            .unwrap()
            .insert(user.uuid.clone(), detail);
        self.users.lock().unwrap().insert(user.uuid.clone(), user);
    }
}

#[async_trait]
impl UserStore for FakeUserStore {
    async fn login(&self, email: &str, password: &str) -> Result<Option<String>> {
        let users = self.users.lock().unwrap();
        let Some(user) = users.values().find(|u| u.email == email) else {
            return Ok(None);
        };
        match self.passwords.lock().unwrap().get(email) {
            Some(expected) if expected == password => Ok(Some(user.uuid.clone())),
            _ => Ok(None),
        }
    }

    async fn get_md5_salt(&self, _email: &str) -> Result<Option<String>> {
        Ok(Some("test-salt".to_string()))
    }

    async fn login_md5(&self, _email: &str, _hex_hash: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn update_date_login(&self, _uuid: &str) {}

    async fn get(&self, uuid: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(uuid).cloned())
    }

    async fn get_detail(&self, uuid: &str) -> Result<Option<UserDetail>> {
        Ok(self.details.lock().unwrap().get(uuid).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn save_batch(&self, entries: &[(User, UserDetail)]) -> Result<()> {
        self.saved_batches
            .lock()
            .unwrap()
            .extend(entries.iter().cloned());
        Ok(())
    }

    async fn get_oim_batch(&self, _recipient_uuid: &str) -> Result<Vec<Oim>> {
        Ok(Vec::new())
    }

    async fn get_oim_single(
        &self,
        _recipient_uuid: &str,
        _oim_uuid: &str,
        _mark_read: bool,
    ) -> Result<Option<Oim>> {
        Ok(None)
    }

    async fn save_oim(&self, _recipient_uuid: &str, oim: Oim) -> Result<Oim> {
        Ok(oim)
    }

    async fn delete_oim(&self, _recipient_uuid: &str, _oim_uuid: &str) -> Result<()> {
        Ok(())
    }
}

pub fn new_user(uuid: &str, email: &str) -> User {
    User::new(1, uuid.to_string(), email.to_string())
}
