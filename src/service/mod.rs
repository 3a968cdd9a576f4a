//! Business services. Scoped to the persistence façade the presence core
//! depends on (spec.md §4.1).

pub mod user_service;

pub use user_service::UserService;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Oim, User, UserDetail};

/// The persistence façade `NotificationCore` depends on, abstracted so
/// tests can substitute an in-memory double without a live Postgres
/// instance (SPEC_FULL.md §8). `UserService` is the only production
/// implementation.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<Option<String>>;
    async fn get_md5_salt(&self, email: &str) -> Result<Option<String>>;
    async fn login_md5(&self, email: &str, hex_hash: &str) -> Result<Option<String>>;
    fn update_date_login(&self, uuid: &str);
    async fn get(&self, uuid: &str) -> Result<Option<User>>;
    async fn get_detail(&self, uuid: &str) -> Result<Option<UserDetail>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn save_batch(&self, entries: &[(User, UserDetail)]) -> Result<()>;
    async fn get_oim_batch(&self, recipient_uuid: &str) -> Result<Vec<Oim>>;
    async fn get_oim_single(
        &self,
        recipient_uuid: &str,
        oim_uuid: &str,
        mark_read: bool,
    ) -> Result<Option<Oim>>;
    async fn save_oim(&self, recipient_uuid: &str, oim: Oim) -> Result<Oim>;
    async fn delete_oim(&self, recipient_uuid: &str, oim_uuid: &str) -> Result<()>;
}

#[async_trait]
impl UserStore for UserService {
    async fn login(&self, email: &str, password: &str) -> Result<Option<String>> {
        UserService::login(self, email, password).await
    }

    async fn get_md5_salt(&self, email: &str) -> Result<Option<String>> {
        UserService::get_md5_salt(self, email).await
    }

    async fn login_md5(&self, email: &str, hex_hash: &str) -> Result<Option<String>> {
        UserService::login_md5(self, email, hex_hash).await
    }

    fn update_date_login(&self, uuid: &str) {
        UserService::update_date_login(self, uuid)
    }

    async fn get(&self, uuid: &str) -> Result<Option<User>> {
        UserService::get(self, uuid).await
    }

    async fn get_detail(&self, uuid: &str) -> Result<Option<UserDetail>> {
        UserService::get_detail(self, uuid).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        UserService::get_by_email(self, email).await
    }

    async fn save_batch(&self, entries: &[(User, UserDetail)]) -> Result<()> {
        UserService::save_batch(self, entries).await
    }

    async fn get_oim_batch(&self, recipient_uuid: &str) -> Result<Vec<Oim>> {
        UserService::get_oim_batch(self, recipient_uuid).await
    }

    async fn get_oim_single(
        &self,
        recipient_uuid: &str,
        oim_uuid: &str,
        mark_read: bool,
    ) -> Result<Option<Oim>> {
        UserService::get_oim_single(self, recipient_uuid, oim_uuid, mark_read).await
    }

    async fn save_oim(&self, recipient_uuid: &str, oim: Oim) -> Result<Oim> {
        UserService::save_oim(self, recipient_uuid, oim).await
    }

    async fn delete_oim(&self, recipient_uuid: &str, oim_uuid: &str) -> Result<()> {
        UserService::delete_oim(self, recipient_uuid, oim_uuid).await
    }
}
