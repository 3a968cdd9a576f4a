//! `NotificationCore`: owns the live `user_by_uuid` arena, the dirty set,
//! and orchestrates every roster/presence/switchboard operation in
//! spec.md §4.4-§4.8. Grounded in `original_source/core/notification.py`
//! for operation shape; the concurrency choice (a single `tokio::sync::Mutex`
//! guarding the arena + dirty set, session registry left independently
//! concurrent) is recorded in SPEC_FULL.md §5.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::error::{CoreError, Result};
use crate::model::contact::{Contact, ContactInfo, Lst};
use crate::model::group::{Group, UNGROUPED_ID};
use crate::model::user::{Substatus, User, UserStatus};
use crate::model::event::{LoginOption, ServiceAddress, SessionEvent};
use crate::service::UserStore;
use crate::session::{Session, SessionRegistry};

/// In-memory state protected by one logical mutex, per spec.md §5: the
/// `user_by_uuid` arena (I6's single-instance-per-uuid requirement) and the
/// dirty set of users awaiting persistence.
struct CoreState {
    user_by_uuid: HashMap<String, User>,
    dirty: HashMap<String, crate::model::UserDetail>,
}

/// Patchable fields for `contact_edit` (spec.md §4.6).
#[derive(Debug, Clone, Default)]
pub struct ContactEdit {
    pub is_favorite: Option<bool>,
    pub is_messenger_user: Option<bool>,
    pub info: Option<ContactInfo>,
}

/// Patchable fields for `me_update` (spec.md §4.6): `substatus`, `message`,
/// `media`, `name`, `gtc`, `blp`, `capabilities`, `msnobj`.
#[derive(Debug, Clone, Default)]
pub struct MeUpdate {
    pub substatus: Option<Substatus>,
    pub status_message: Option<(String, bool)>,
    pub media: Option<Option<String>>,
    pub name: Option<String>,
    pub gtc: Option<String>,
    pub blp: Option<String>,
    pub capabilities: Option<String>,
    pub msnobj: Option<String>,
}

pub struct NotificationCore {
    user_service: Arc<dyn UserStore>,
    auth_service: Arc<AuthService>,
    registry: Arc<SessionRegistry>,
    state: Mutex<CoreState>,
    sb_address: ServiceAddress,
}

impl NotificationCore {
    /// Depends on `UserStore` rather than the concrete `UserService` so
    /// tests can substitute an in-memory double without a live Postgres
    /// instance (SPEC_FULL.md §8).
    pub fn new(
        user_service: Arc<dyn UserStore>,
        auth_service: Arc<AuthService>,
        registry: Arc<SessionRegistry>,
        sb_address: ServiceAddress,
    ) -> Self {
        Self {
            user_service,
            auth_service,
            registry,
            state: Mutex::new(CoreState {
                user_by_uuid: HashMap::new(),
                dirty: HashMap::new(),
            }),
            sb_address,
        }
    }

    fn require_user(&self, sess: &Session) -> Result<String> {
        sess.user_uuid().ok_or(CoreError::AuthenticationFailed)
    }

    // ---- 4.4 login/logout -------------------------------------------------

    /// Verifies credentials and mints an `nb/login` token; no session is
    /// created here (spec.md §4.4).
    pub async fn login_twn_start(&self, email: &str, password: &str) -> Result<Option<String>> {
        let Some(uuid) = self.user_service.login(email, password).await? else {
            return Ok(None);
        };
        let token = self
            .auth_service
            .create_token("nb/login", serde_json::json!({ "uuid": uuid }), None);
        Ok(Some(token))
    }

    pub async fn login_twn_verify(
        &self,
        sess: &Arc<Session>,
        token: &str,
        option: LoginOption,
    ) -> Result<Option<User>> {
        let Some(payload) = self.auth_service.pop_token("nb/login", token) else {
            return Ok(None);
        };
        let Some(uuid) = payload.get("uuid").and_then(Value::as_str) else {
            return Ok(None);
        };
        let user = self._login_common(sess, uuid, option).await?;
        Ok(Some(user))
    }

    pub async fn login_md5_verify(
        &self,
        sess: &Arc<Session>,
        email: &str,
        md5_hash: &str,
        option: LoginOption,
    ) -> Result<Option<User>> {
        let Some(uuid) = self.user_service.login_md5(email, md5_hash).await? else {
            return Ok(None);
        };
        let user = self._login_common(sess, &uuid, option).await?;
        Ok(Some(user))
    }

    /// Shared tail of every login path (spec.md §4.4). Evicts or notifies
    /// prior sessions per `LoginOption` *before* the new session is bound
    /// (SPEC_FULL.md §3), then resolves/caches the user, binds the session
    /// to a fresh session token (spec.md §9 Open Question), attaches
    /// `UserDetail` if not already shared (I6), and fans out presence.
    pub async fn _login_common(
        &self,
        sess: &Arc<Session>,
        uuid: &str,
        option: LoginOption,
    ) -> Result<User> {
        self.user_service.update_date_login(uuid);

        for prior in self.registry.get_by_user(uuid) {
            match option {
                LoginOption::BootOthers => {
                    prior.send_event(SessionEvent::PopBoot);
                    self.registry.remove(&prior);
                    prior.close();
                }
                LoginOption::NotifyOthers => {
                    prior.send_event(SessionEvent::PopNotify);
                }
                LoginOption::Duplicate => {}
            }
        }

        let token = self
            .auth_service
            .create_token("session", serde_json::json!({ "uuid": uuid }), None);
        sess.bind(uuid.to_string(), token);
        self.registry.add(sess.clone())?;

        let mut state = self.state.lock().await;

        if !state.user_by_uuid.contains_key(uuid) {
            let user = self
                .user_service
                .get(uuid)
                .await?
                .ok_or(CoreError::UserDoesNotExist)?;
            state.user_by_uuid.insert(uuid.to_string(), user);
        }

        let needs_detail = state
            .user_by_uuid
            .get(uuid)
            .map(|u| u.detail.is_none())
            .unwrap_or(false);
        if needs_detail {
            let detail = self.user_service.get_detail(uuid).await?;
            if let Some(user) = state.user_by_uuid.get_mut(uuid) {
                user.detail = detail;
            }
        }

        sync_contact_statuses(&mut state, &self.registry);
        generic_notify(&state, &self.registry, uuid);

        state
            .user_by_uuid
            .get(uuid)
            .cloned()
            .ok_or(CoreError::UserDoesNotExist)
    }

    /// `on_connection_lost` (spec.md §4.4): removes the session; if any
    /// sibling session of the same user remains, the user stays online.
    /// Otherwise clears `detail`, recomputes visibility, and announces the
    /// user offline.
    pub async fn on_connection_lost(&self, sess: &Arc<Session>) -> Result<()> {
        let Some(uuid) = sess.user_uuid() else {
            return Ok(());
        };
        self.registry.remove(sess);
        sess.close();

        if !self.registry.get_by_user(&uuid).is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        if let Some(user) = state.user_by_uuid.get_mut(&uuid) {
            user.detail = None;
        }
        sync_contact_statuses(&mut state, &self.registry);
        generic_notify(&state, &self.registry, &uuid);
        Ok(())
    }

    // ---- 4.6 roster mutations: groups -------------------------------------

    pub async fn group_add(&self, sess: &Arc<Session>, name: &str) -> Result<Group> {
        let uuid = self.require_user(sess)?;
        let mut state = self.state.lock().await;
        let detail = user_detail_mut(&mut state, &uuid)?;

        detail.validate_group_name(name, None)?;
        let id = detail.gen_group_id();
        let group = Group::new(id, Uuid::new_v4().to_string().to_uppercase(), name.to_string());
        detail.insert_group(group.clone());
        mark_modified(&mut state, &uuid);
        Ok(group)
    }

    pub async fn group_remove(&self, sess: &Arc<Session>, id: &str) -> Result<()> {
        let uuid = self.require_user(sess)?;
        if id == UNGROUPED_ID {
            return Err(CoreError::CannotRemoveSpecialGroup);
        }
        let mut state = self.state.lock().await;
        let detail = user_detail_mut(&mut state, &uuid)?;
        detail.delete_group(id).ok_or(CoreError::GroupDoesNotExist)?;
        detail.scrub_group_from_contacts(id);
        mark_modified(&mut state, &uuid);
        Ok(())
    }

    /// Uses the explicit `new_name` parameter (spec.md §9 Open Question:
    /// the original's `me_group_edit` references the wrong variable).
    pub async fn group_edit(&self, sess: &Arc<Session>, id: &str, new_name: &str) -> Result<()> {
        let uuid = self.require_user(sess)?;
        let mut state = self.state.lock().await;
        let detail = user_detail_mut(&mut state, &uuid)?;

        detail.validate_group_name(new_name, Some(id))?;
        let mut group = detail
            .get_group_by_id(id)
            .cloned()
            .ok_or(CoreError::GroupDoesNotExist)?;
        group.name = new_name.to_string();
        group.date_modified = Utc::now();
        detail.insert_group(group);
        mark_modified(&mut state, &uuid);
        Ok(())
    }

    pub async fn group_contact_add(
        &self,
        sess: &Arc<Session>,
        group_id: &str,
        contact_uuid: &str,
    ) -> Result<()> {
        let uuid = self.require_user(sess)?;
        if group_id == UNGROUPED_ID {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        let detail = user_detail_mut(&mut state, &uuid)?;

        let group_uuid = detail
            .get_group_by_id(group_id)
            .ok_or(CoreError::GroupDoesNotExist)?
            .uuid
            .clone();
        let contact = detail
            .contacts
            .get_mut(contact_uuid)
            .ok_or(CoreError::ContactDoesNotExist)?;
        if contact.is_in_group_id(group_id) {
            return Err(CoreError::ContactAlreadyOnList);
        }
        contact.add_group(group_id.to_string(), group_uuid);
        mark_modified(&mut state, &uuid);
        Ok(())
    }

    /// Symmetric with `group_contact_add`; removing from the implicit
    /// ungrouped bucket (`"0"`) signals `ContactNotOnList` when the contact
    /// has no group memberships at all (spec.md §4.6).
    pub async fn group_contact_remove(
        &self,
        sess: &Arc<Session>,
        group_id: &str,
        contact_uuid: &str,
    ) -> Result<()> {
        let uuid = self.require_user(sess)?;
        let mut state = self.state.lock().await;
        let detail = user_detail_mut(&mut state, &uuid)?;

        if group_id != UNGROUPED_ID && detail.get_group_by_id(group_id).is_none() {
            return Err(CoreError::GroupDoesNotExist);
        }
        let contact = detail
            .contacts
            .get_mut(contact_uuid)
            .ok_or(CoreError::ContactDoesNotExist)?;

        if group_id == UNGROUPED_ID {
            if contact.groups.is_empty() {
                return Err(CoreError::ContactNotOnList);
            }
        } else if !contact.remove_from_group(group_id) {
            return Err(CoreError::ContactNotOnList);
        }
        mark_modified(&mut state, &uuid);
        Ok(())
    }

    // ---- 4.6 roster mutations: contacts -----------------------------------

    /// Adds `contact_uuid` to the acting user's `lst` (spec.md §4.6). When
    /// `lst` includes `FL`, mirrors `RL` onto the contact's side (I1) and
    /// notifies every live session of the contact with `AddedToList`
    /// *before* the presence fan-out (spec.md §5 ordering guarantee).
    pub async fn contact_add(
        &self,
        sess: &Arc<Session>,
        contact_uuid: &str,
        lst: Lst,
        name: &str,
    ) -> Result<Contact> {
        let uuid = self.require_user(sess)?;

        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state, contact_uuid).await?;

        {
            let detail = user_detail_mut(&mut state, &uuid)?;
            let contact = detail
                .contacts
                .entry(contact_uuid.to_string())
                .or_insert_with(|| Contact::new(contact_uuid.to_string(), name.to_string()));
            contact.lists.insert(lst);
        }

        if lst.contains(Lst::FL) {
            let adder = state.user_by_uuid.get(&uuid).cloned();
            if let Some(head) = state.user_by_uuid.get_mut(contact_uuid) {
                if let Some(head_detail) = head.detail.as_mut() {
                    let reverse = head_detail
                        .contacts
                        .entry(uuid.clone())
                        .or_insert_with(|| Contact::new(uuid.clone(), String::new()));
                    reverse.lists.insert(Lst::RL);
                }
            }
            mark_modified(&mut state, contact_uuid);

            if let Some(adder) = adder {
                for s in self.registry.get_by_user(contact_uuid) {
                    s.send_event(SessionEvent::AddedToList {
                        lst: Lst::RL,
                        user: adder.clone(),
                    });
                }
            }
        }

        sync_contact_statuses(&mut state, &self.registry);
        mark_modified(&mut state, &uuid);
        generic_notify(&state, &self.registry, &uuid);

        state
            .user_by_uuid
            .get(&uuid)
            .and_then(|u| u.detail.as_ref())
            .and_then(|d| d.contacts.get(contact_uuid))
            .cloned()
            .ok_or_else(|| CoreError::ServerError("contact vanished after add".into()))
    }

    pub async fn contact_edit(
        &self,
        sess: &Arc<Session>,
        contact_uuid: &str,
        edit: ContactEdit,
    ) -> Result<()> {
        let uuid = self.require_user(sess)?;
        let mut state = self.state.lock().await;
        let detail = user_detail_mut(&mut state, &uuid)?;
        let contact = detail
            .contacts
            .get_mut(contact_uuid)
            .ok_or(CoreError::ContactDoesNotExist)?;

        if let Some(is_favorite) = edit.is_favorite {
            contact.is_favorite = is_favorite;
        }
        if let Some(is_messenger_user) = edit.is_messenger_user {
            contact.is_messenger_user = is_messenger_user;
        }
        if let Some(info) = edit.info {
            contact.info = info;
        }
        mark_modified(&mut state, &uuid);
        Ok(())
    }

    /// Removes `lst` from the contact's bit-flags (I3 purges the `Contact`
    /// once empty). Removing `FL` also clears the mirrored `RL` (I1); `RL`
    /// itself cannot be removed directly (it is managed indirectly).
    pub async fn contact_remove(
        &self,
        sess: &Arc<Session>,
        contact_uuid: &str,
        lst: Lst,
    ) -> Result<()> {
        let uuid = self.require_user(sess)?;
        if lst.contains(Lst::RL) {
            return Err(CoreError::ServerError(
                "RL is managed indirectly and cannot be removed directly".into(),
            ));
        }

        let mut state = self.state.lock().await;

        {
            let detail = user_detail_mut(&mut state, &uuid)?;
            let contact = detail
                .contacts
                .get_mut(contact_uuid)
                .ok_or(CoreError::ContactNotOnList)?;
            contact.lists.remove(lst);
            if contact.lists.is_empty() {
                detail.contacts.remove(contact_uuid);
            }
        }

        if lst.contains(Lst::FL) {
            if let Some(head) = state.user_by_uuid.get_mut(contact_uuid) {
                if let Some(head_detail) = head.detail.as_mut() {
                    if let Some(reverse) = head_detail.contacts.get_mut(&uuid) {
                        reverse.lists.remove(Lst::RL);
                        if reverse.lists.is_empty() {
                            head_detail.contacts.remove(&uuid);
                        }
                    }
                }
            }
            mark_modified(&mut state, contact_uuid);
        }

        sync_contact_statuses(&mut state, &self.registry);
        mark_modified(&mut state, &uuid);
        generic_notify(&state, &self.registry, &uuid);
        Ok(())
    }

    /// Patches the acting user's own status/profile/settings, then
    /// recomputes and fans out presence (spec.md §4.6).
    pub async fn me_update(&self, sess: &Arc<Session>, update: MeUpdate) -> Result<()> {
        let uuid = self.require_user(sess)?;
        let mut state = self.state.lock().await;
        let user = state
            .user_by_uuid
            .get_mut(&uuid)
            .ok_or(CoreError::UserDoesNotExist)?;

        if let Some(substatus) = update.substatus {
            user.status.substatus = substatus;
        }
        if let Some((text, persistent)) = update.status_message {
            user.status.set_status_message(text, persistent);
        }
        if let Some(media) = update.media {
            user.status.media = media;
        }
        if let Some(name) = update.name {
            user.status.name = name;
        }
        if update.gtc.is_some()
            || update.blp.is_some()
            || update.capabilities.is_some()
            || update.msnobj.is_some()
        {
            if !matches!(user.settings, Value::Object(_)) {
                user.settings = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(obj) = &mut user.settings {
                if let Some(gtc) = update.gtc {
                    obj.insert("gtc".to_string(), Value::String(gtc));
                }
                if let Some(blp) = update.blp {
                    obj.insert("BLP".to_string(), Value::String(blp));
                }
                if let Some(capabilities) = update.capabilities {
                    obj.insert("capabilities".to_string(), Value::String(capabilities));
                }
                if let Some(msnobj) = update.msnobj {
                    obj.insert("msnobj".to_string(), Value::String(msnobj));
                }
            }
        }
        user.date_modified = Utc::now();

        sync_contact_statuses(&mut state, &self.registry);
        mark_modified(&mut state, &uuid);
        generic_notify(&state, &self.registry, &uuid);
        Ok(())
    }

    // ---- 4.7 switchboard brokering -----------------------------------------

    pub fn sb_token_create(
        &self,
        sess: &Session,
        extra_data: Option<Value>,
    ) -> Result<(String, ServiceAddress)> {
        let uuid = self.require_user(sess)?;
        let payload = serde_json::json!({ "uuid": uuid, "extra_data": extra_data });
        let token = self.auth_service.create_token("sb/xfr", payload, None);
        Ok((token, self.sb_address.clone()))
    }

    /// Mints one `sb/cal` token per live session of the callee and emits
    /// `InvitedToChat` to each (spec.md §4.7, scenario S6).
    pub async fn notify_call(&self, caller_uuid: &str, callee_email: &str, chatid: &str) -> Result<()> {
        let Some(callee) = self.user_service.get_by_email(callee_email).await? else {
            return Err(CoreError::UserDoesNotExist);
        };
        let callee_uuid = callee.uuid;

        let (caller_snapshot, offlineish) = {
            let state = self.state.lock().await;
            let caller = state
                .user_by_uuid
                .get(caller_uuid)
                .ok_or(CoreError::UserDoesNotExist)?;
            let contact = caller
                .detail
                .as_ref()
                .and_then(|d| d.contacts.get(&callee_uuid))
                .ok_or(CoreError::ContactDoesNotExist)?;
            (caller.clone(), contact.status.substatus.is_offlineish())
        };

        let callee_sessions = self.registry.get_by_user(&callee_uuid);
        if offlineish || callee_sessions.is_empty() {
            return Err(CoreError::ContactNotOnline);
        }

        for sess in callee_sessions {
            let payload = serde_json::json!({
                "uuid": callee_uuid,
                "extra_data": { "session": sess.id.to_string() },
            });
            let token = self.auth_service.create_token("sb/cal", payload, None);
            sess.send_event(SessionEvent::InvitedToChat {
                sb_address: self.sb_address.clone(),
                chatid: chatid.to_string(),
                token,
                caller: caller_snapshot.clone(),
            });
        }
        Ok(())
    }

    /// Ensures `uuid` is resident in the arena *with an attached
    /// `UserDetail`* to mutate, regardless of whether a live session for
    /// them exists — so roster mutations that touch a not-currently-logged-in
    /// user (e.g. the `RL` mirror in `contact_add`) have somewhere to write
    /// (spec.md §5: the arena "grows monotonically"). Mirrors
    /// `_login_common`'s own `needs_detail` check: reloads whenever `detail`
    /// is `None`, not only when the uuid is entirely new to the arena — a
    /// user who logged in before and has since logged out is already
    /// resident with `detail == None`, and must still be reloaded here.
    /// `detail` being attached is purely a "there is a roster to mutate"
    /// signal; presence visibility is decided separately, by
    /// `SessionRegistry`, not by this field.
    async fn ensure_loaded(&self, state: &mut CoreState, uuid: &str) -> Result<()> {
        if !state.user_by_uuid.contains_key(uuid) {
            let user = self
                .user_service
                .get(uuid)
                .await?
                .ok_or(CoreError::UserDoesNotExist)?;
            state.user_by_uuid.insert(uuid.to_string(), user);
        }

        let needs_detail = state
            .user_by_uuid
            .get(uuid)
            .map(|u| u.detail.is_none())
            .unwrap_or(false);
        if needs_detail {
            let detail = self.user_service.get_detail(uuid).await?;
            if let Some(user) = state.user_by_uuid.get_mut(uuid) {
                user.detail = detail;
            }
        }
        Ok(())
    }

    // ---- 4.8 persistence pump ---------------------------------------------

    /// Spawns the background pump: sleeps `interval`, then drains up to
    /// `batch_size` dirty entries into `UserService::save_batch`. Never
    /// exits on its own; call `PumpHandle::shutdown` to stop it, which
    /// performs one final drain first (spec.md §5, §9 "Background pump").
    pub fn spawn_pump(self: Arc<Self>, interval: Duration, batch_size: usize) -> PumpHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let core = self;
        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        core.drain_dirty(batch_size).await;
                    }
                    _ = shutdown_rx.changed() => {
                        core.drain_dirty(batch_size).await;
                        break;
                    }
                }
            }
        });
        PumpHandle {
            join: Some(join),
            shutdown: shutdown_tx,
        }
    }

    async fn drain_dirty(&self, batch_size: usize) {
        let batch = {
            let mut state = self.state.lock().await;
            let keys: Vec<String> = state.dirty.keys().take(batch_size).cloned().collect();
            let mut batch = Vec::with_capacity(keys.len());
            for key in keys {
                let Some(detail) = state.dirty.remove(&key) else {
                    continue;
                };
                let Some(user) = state.user_by_uuid.get(&key) else {
                    warn!(uuid = %key, "dirty entry for a user no longer in the arena");
                    continue;
                };
                batch.push((user.clone(), detail));
            }
            batch
        };

        if batch.is_empty() {
            return;
        }
        if let Err(e) = self.user_service.save_batch(&batch).await {
            error!(error = %e, "persistence pump: save_batch failed, will retry next drain");
        }
    }
}

/// Handle to a running pump; dropping it leaves the pump running detached,
/// use `shutdown` for a clean final drain.
pub struct PumpHandle {
    join: Option<tokio::task::JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl PumpHandle {
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

fn user_detail_mut<'a>(state: &'a mut CoreState, uuid: &str) -> Result<&'a mut crate::model::UserDetail> {
    state
        .user_by_uuid
        .get_mut(uuid)
        .ok_or(CoreError::UserDoesNotExist)?
        .detail
        .as_mut()
        .ok_or_else(|| CoreError::ServerError("acting user has no attached detail".into()))
}

/// `_mark_modified` (spec.md §4.8, §9): keyed insertion tolerates the same
/// user being marked many times between drains without duplicate entries.
fn mark_modified(state: &mut CoreState, uuid: &str) {
    if let Some(user) = state.user_by_uuid.get(uuid) {
        if let Some(detail) = &user.detail {
            state.dirty.insert(uuid.to_string(), detail.clone());
        }
    }
}

/// `is_blocking(blocker, blockee)` (spec.md §4.5).
fn is_blocking(blocker: &User, blockee_uuid: &str) -> bool {
    let lists = blocker
        .detail
        .as_ref()
        .and_then(|d| d.contacts.get(blockee_uuid))
        .map(|c| c.lists)
        .unwrap_or(Lst::NONE);

    if lists.contains(Lst::BL) {
        true
    } else if lists.contains(Lst::AL) {
        false
    } else {
        blocker.blp() == "BL"
    }
}

/// Whether `uuid` has at least one live session, per `original_source`'s
/// `head.detail is None` check — reimplemented against `SessionRegistry`
/// rather than `User::detail`, since `detail` can be attached to an offline
/// user purely so a roster mutation has somewhere to write (see
/// `ensure_loaded`) and is therefore not a reliable online signal.
fn is_online(registry: &SessionRegistry, uuid: &str) -> bool {
    !registry.get_by_user(uuid).is_empty()
}

/// `compute_visible_status(contact, observer)` (spec.md §4.5, I5): returns
/// the status an `observer` should see for `head`. Hidden (offline or
/// blocked) only forces `substatus` to `Offline`; `name`/`message`/`media`
/// are left as `current` (the contact's own previously-known status), per
/// `original_source/core/models.py::Contact.compute_visible_status`, which
/// does not touch those fields in the hidden branch.
fn compute_visible_status(head: &User, observer_uuid: &str, online: bool, current: &UserStatus) -> UserStatus {
    if !online || is_blocking(head, observer_uuid) {
        let mut hidden = current.clone();
        hidden.substatus = Substatus::Offline;
        hidden
    } else {
        head.status.clone()
    }
}

/// `_sync_contact_statuses()` (spec.md §4.5): recomputes every loaded
/// user's view of every contact. Snapshots the arena first so a head user's
/// fields can be read while a different (observer) user's contact entries
/// are mutated — both live in the same map.
fn sync_contact_statuses(state: &mut CoreState, registry: &SessionRegistry) {
    let snapshot: HashMap<String, User> = state.user_by_uuid.clone();

    for owner in state.user_by_uuid.values_mut() {
        let owner_uuid = owner.uuid.clone();
        let Some(detail) = owner.detail.as_mut() else {
            continue;
        };
        for (head_uuid, contact) in detail.contacts.iter_mut() {
            contact.status = match snapshot.get(head_uuid) {
                Some(head) => {
                    let online = is_online(registry, head_uuid);
                    compute_visible_status(head, &owner_uuid, online, &contact.status)
                }
                None => UserStatus::default(),
            };
        }
    }
}

/// `_generic_notify(sess)` (spec.md §4.5): dispatches `PresenceNotification`
/// to every other session that has `changed_uuid` among its contacts.
/// Sessions of `changed_uuid` itself are skipped.
fn generic_notify(state: &CoreState, registry: &SessionRegistry, changed_uuid: &str) {
    for sess in registry.iter_all() {
        let Some(observer_uuid) = sess.user_uuid() else {
            continue;
        };
        if observer_uuid == changed_uuid {
            continue;
        }
        let Some(observer) = state.user_by_uuid.get(&observer_uuid) else {
            continue;
        };
        let Some(detail) = &observer.detail else {
            continue;
        };
        if let Some(contact) = detail.contacts.get(changed_uuid) {
            sess.send_event(SessionEvent::PresenceNotification {
                contact: contact.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserDetail;

    fn user_with_detail(uuid: &str) -> User {
        let mut user = User::new(1, uuid.to_string(), format!("{uuid}@example.test"));
        user.detail = Some(UserDetail::new());
        user
    }

    #[test]
    fn is_blocking_defaults_to_blp_when_no_explicit_entry() {
        let mut blocker = user_with_detail("h");
        blocker.settings = serde_json::json!({ "BLP": "BL" });
        assert!(is_blocking(&blocker, "observer"));

        blocker.settings = serde_json::json!({ "BLP": "AL" });
        assert!(!is_blocking(&blocker, "observer"));
    }

    #[test]
    fn is_blocking_explicit_bl_overrides_blp() {
        let mut blocker = user_with_detail("h");
        blocker.settings = serde_json::json!({ "BLP": "AL" });
        blocker
            .detail
            .as_mut()
            .unwrap()
            .contacts
            .insert("observer".to_string(), {
                let mut c = Contact::new("observer".to_string(), String::new());
                c.lists = Lst::BL;
                c
            });
        assert!(is_blocking(&blocker, "observer"));
    }

    #[test]
    fn is_blocking_explicit_al_overrides_blp() {
        let mut blocker = user_with_detail("h");
        blocker.settings = serde_json::json!({ "BLP": "BL" });
        blocker
            .detail
            .as_mut()
            .unwrap()
            .contacts
            .insert("observer".to_string(), {
                let mut c = Contact::new("observer".to_string(), String::new());
                c.lists = Lst::AL;
                c
            });
        assert!(!is_blocking(&blocker, "observer"));
    }

    #[test]
    fn compute_visible_status_hides_when_offline_but_keeps_cached_fields() {
        let mut head = user_with_detail("h");
        head.status.substatus = Substatus::Online;
        let current = UserStatus {
            name: "Cached Name".to_string(),
            ..UserStatus::default()
        };
        let status = compute_visible_status(&head, "observer", false, &current);
        assert_eq!(status.substatus, Substatus::Offline);
        assert_eq!(status.name, "Cached Name");
    }

    #[test]
    fn compute_visible_status_copies_when_visible() {
        let mut head = user_with_detail("h");
        head.status.substatus = Substatus::Busy;
        head.status.name = "Alice".to_string();
        let status = compute_visible_status(&head, "observer", true, &UserStatus::default());
        assert_eq!(status.substatus, Substatus::Busy);
        assert_eq!(status.name, "Alice");
    }

    #[test]
    fn compute_visible_status_hides_when_blocked_but_keeps_cached_fields() {
        let mut head = user_with_detail("h");
        head.settings = serde_json::json!({ "BLP": "AL" });
        head.status.substatus = Substatus::Online;
        head.detail
            .as_mut()
            .unwrap()
            .contacts
            .insert("observer".to_string(), {
                let mut c = Contact::new("observer".to_string(), String::new());
                c.lists = Lst::BL;
                c
            });
        let current = UserStatus {
            name: "Cached Name".to_string(),
            ..UserStatus::default()
        };
        let status = compute_visible_status(&head, "observer", true, &current);
        assert_eq!(status.substatus, Substatus::Offline);
        assert_eq!(status.name, "Cached Name");
    }

    #[test]
    fn sync_contact_statuses_reflects_default_deny_blp_even_when_online() {
        let mut state = CoreState {
            user_by_uuid: HashMap::new(),
            dirty: HashMap::new(),
        };

        let mut alice = user_with_detail("a");
        alice.settings = serde_json::json!({ "BLP": "BL" });
        alice.status.substatus = Substatus::Online;

        let mut bob = user_with_detail("b");
        bob.detail
            .as_mut()
            .unwrap()
            .contacts
            .insert("a".to_string(), Contact::new("a".to_string(), "Alice".to_string()));

        state.user_by_uuid.insert("a".to_string(), alice);
        state.user_by_uuid.insert("b".to_string(), bob);

        // Alice is online (has a live session) so the hidden status below is
        // demonstrably due to default-deny BLP, not merely being offline.
        let registry = SessionRegistry::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let sess = Arc::new(Session::new(tx));
        sess.bind("a".to_string(), "tok".to_string());
        registry.add(sess).unwrap();

        sync_contact_statuses(&mut state, &registry);

        let bob = state.user_by_uuid.get("b").unwrap();
        let contact = bob.detail.as_ref().unwrap().contacts.get("a").unwrap();
        assert_eq!(contact.status.substatus, Substatus::Offline);
    }

    #[test]
    fn mark_modified_is_idempotent_per_uuid() {
        let mut state = CoreState {
            user_by_uuid: HashMap::new(),
            dirty: HashMap::new(),
        };
        state.user_by_uuid.insert("a".to_string(), user_with_detail("a"));

        mark_modified(&mut state, "a");
        mark_modified(&mut state, "a");
        assert_eq!(state.dirty.len(), 1);
    }
}
