//! End-to-end scenarios from spec.md §8 (S1-S6), run against `NotificationCore`
//! wired to the in-memory `FakeUserStore` (see `tests/common`) so no live
//! Postgres instance is required.

mod common;

use std::sync::Arc;

use tokio::sync::mpsc;

use privchat_core::auth::AuthService;
use privchat_core::core::NotificationCore;
use privchat_core::model::{LoginOption, Lst, ServiceAddress, SessionEvent, Substatus, UserDetail};
use privchat_core::session::{Session, SessionRegistry};

use common::{new_user, FakeUserStore};

fn new_core(store: FakeUserStore) -> Arc<NotificationCore> {
    Arc::new(NotificationCore::new(
        Arc::new(store),
        Arc::new(AuthService::new()),
        Arc::new(SessionRegistry::new()),
        ServiceAddress {
            host: "127.0.0.1".to_string(),
            port: 1863,
        },
    ))
}

fn new_session() -> (Arc<Session>, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Session::new(tx)), rx)
}

async fn login(core: &NotificationCore, uuid: &str) -> Arc<Session> {
    let (sess, _rx) = new_session();
    core._login_common(&sess, uuid, LoginOption::Duplicate)
        .await
        .expect("login");
    sess
}

/// S1: mutual add. Alice adds Bob to her forward list; Bob's reverse list
/// (`RL`) is mirrored automatically and he is notified (I1).
#[tokio::test]
async fn s1_mutual_add_mirrors_reverse_list() {
    let store = FakeUserStore::new();
    store.seed(new_user("alice", "alice@example.test"), UserDetail::new(), "pw");
    store.seed(new_user("bob", "bob@example.test"), UserDetail::new(), "pw");
    let core = new_core(store);

    let alice_sess = login(&core, "alice").await;
    let (bob_sess, mut bob_events) = new_session();
    core._login_common(&bob_sess, "bob", LoginOption::Duplicate)
        .await
        .expect("bob login");

    let contact = core
        .contact_add(&alice_sess, "bob", Lst::FL, "Bob")
        .await
        .expect("contact_add");
    assert!(contact.lists.contains(Lst::FL));

    let mut saw_added_to_list = false;
    while let Ok(event) = bob_events.try_recv() {
        if let SessionEvent::AddedToList { lst, user } = event {
            assert!(lst.contains(Lst::RL));
            assert_eq!(user.uuid, "alice");
            saw_added_to_list = true;
        }
    }
    assert!(saw_added_to_list, "bob should be notified of the RL mirror");
}

/// S2: an explicit `BL` entry hides the blocker's presence from that
/// specific observer, overriding a permissive `BLP`.
#[tokio::test]
async fn s2_block_hides_presence() {
    let store = FakeUserStore::new();
    let mut alice = new_user("alice", "alice@example.test");
    alice.settings = serde_json::json!({ "BLP": "AL" });
    store.seed(alice, UserDetail::new(), "pw");
    store.seed(new_user("bob", "bob@example.test"), UserDetail::new(), "pw");
    let core = new_core(store);

    let alice_sess = login(&core, "alice").await;
    login(&core, "bob").await;

    core.contact_add(&alice_sess, "bob", Lst::FL | Lst::BL, "Bob")
        .await
        .expect("contact_add");

    core.me_update(
        &alice_sess,
        privchat_core::core::MeUpdate {
            substatus: Some(Substatus::Online),
            ..Default::default()
        },
    )
    .await
    .expect("me_update");

    let bob_contact = core
        .contact_add(
            &login(&core, "bob").await,
            "alice",
            Lst::FL,
            "Alice",
        )
        .await
        .expect("bob adds alice");

    assert_eq!(bob_contact.status.substatus, Substatus::Offline);
    // Hiding presence only forces `substatus`; the contact's own known name
    // must survive rather than being wiped to an empty default.
    assert_eq!(bob_contact.status.name, "Alice");
}

/// S3: default-deny — no explicit `AL`/`BL` entry and `BLP=BL` hides
/// presence from an observer who isn't on the allow list.
#[tokio::test]
async fn s3_default_deny_with_blp_bl() {
    let store = FakeUserStore::new();
    let mut alice = new_user("alice", "alice@example.test");
    alice.settings = serde_json::json!({ "BLP": "BL" });
    store.seed(alice, UserDetail::new(), "pw");
    store.seed(new_user("bob", "bob@example.test"), UserDetail::new(), "pw");
    let core = new_core(store);

    login(&core, "alice").await;
    let bob_sess = login(&core, "bob").await;

    let contact = core
        .contact_add(&bob_sess, "alice", Lst::FL, "Alice")
        .await
        .expect("contact_add");

    assert_eq!(contact.status.substatus, Substatus::Offline);
}

/// S4: group add/remove round-trip. A group is created, a contact is filed
/// under it, then removed from the group without leaving the roster, then
/// the group itself is deleted.
#[tokio::test]
async fn s4_group_add_remove_round_trip() {
    let store = FakeUserStore::new();
    store.seed(new_user("alice", "alice@example.test"), UserDetail::new(), "pw");
    store.seed(new_user("bob", "bob@example.test"), UserDetail::new(), "pw");
    let core = new_core(store);

    let alice_sess = login(&core, "alice").await;
    login(&core, "bob").await;

    core.contact_add(&alice_sess, "bob", Lst::FL, "Bob")
        .await
        .expect("contact_add");

    let group = core
        .group_add(&alice_sess, "Friends")
        .await
        .expect("group_add");

    core.group_contact_add(&alice_sess, &group.id, "bob")
        .await
        .expect("group_contact_add");

    let err = core
        .group_contact_add(&alice_sess, &group.id, "bob")
        .await
        .expect_err("adding the same contact twice should fail");
    assert!(matches!(err, privchat_core::CoreError::ContactAlreadyOnList));

    core.group_contact_remove(&alice_sess, &group.id, "bob")
        .await
        .expect("group_contact_remove");

    core.group_remove(&alice_sess, &group.id)
        .await
        .expect("group_remove");

    let err = core
        .group_remove(&alice_sess, &group.id)
        .await
        .expect_err("the group no longer exists");
    assert!(matches!(err, privchat_core::CoreError::GroupDoesNotExist));
}

/// S5: the persistence pump drains dirty users into `UserStore::save_batch`.
#[tokio::test]
async fn s5_pump_drains_dirty_users() {
    let store = Arc::new(FakeUserStore::new());
    store.seed(new_user("alice", "alice@example.test"), UserDetail::new(), "pw");
    store.seed(new_user("bob", "bob@example.test"), UserDetail::new(), "pw");

    let core = Arc::new(NotificationCore::new(
        store.clone(),
        Arc::new(AuthService::new()),
        Arc::new(SessionRegistry::new()),
        ServiceAddress {
            host: "127.0.0.1".to_string(),
            port: 1863,
        },
    ));

    let alice_sess = login(&core, "alice").await;
    core.contact_add(&alice_sess, "bob", Lst::FL, "Bob")
        .await
        .expect("contact_add");

    let pump = core.clone().spawn_pump(std::time::Duration::from_millis(20), 10);
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    pump.shutdown().await;

    let saved = store.saved_batches.lock().unwrap();
    assert!(
        saved.iter().any(|(user, _)| user.uuid == "alice"),
        "alice's roster change should have been persisted by the pump"
    );
}

/// S6: inviting an offline contact into a switchboard chat fails with
/// `ContactNotOnline` rather than silently doing nothing.
#[tokio::test]
async fn s6_switchboard_invite_offline_contact_fails() {
    let store = FakeUserStore::new();
    store.seed(new_user("alice", "alice@example.test"), UserDetail::new(), "pw");
    store.seed(new_user("bob", "bob@example.test"), UserDetail::new(), "pw");
    let core = new_core(store);

    let alice_sess = login(&core, "alice").await;
    core.contact_add(&alice_sess, "bob", Lst::FL, "Bob")
        .await
        .expect("contact_add");

    // bob never logs in: no live session, so he is unreachable for SB invite.
    let err = core
        .notify_call("alice", "bob@example.test", "chat-1")
        .await
        .expect_err("bob is offline");
    assert!(matches!(err, privchat_core::CoreError::ContactNotOnline));
}
