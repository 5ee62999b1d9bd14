use super::*;
use crate::net::api::test_helpers::StubSession;
use crate::state::bus::EventBridge;
use crate::state::cache::{MemoryStorage, UserCache};

fn resp(json: serde_json::Value) -> AuthResponse {
    serde_json::from_value(json).unwrap()
}

fn anonymous() -> AuthResponse {
    resp(serde_json::json!({ "status": 401, "meta": { "is_authenticated": false } }))
}

fn ada() -> AuthResponse {
    resp(serde_json::json!({ "status": 200, "data": { "user": { "id": 7, "username": "ada" }, "methods": [] } }))
}

fn store_with(auth: AuthResponse, cached: Option<User>) -> (AuthStore, EventBridge) {
    let cache = UserCache::with_default_key(Arc::new(MemoryStorage::new()));
    if let Some(user) = &cached {
        cache.store(user);
    }
    let bridge = EventBridge::new();
    let store = AuthStore::new(Arc::new(StubSession::new(Ok(auth))), cache, bridge.clone());
    (store, bridge)
}

#[test]
fn missing_store_degrades_to_defaults() {
    let view = use_auth(None);
    assert_eq!(view.status, 401);
    assert!(view.response.is_none());
    assert!(use_config(None).is_none());
    assert!(use_user(None).is_none());
    assert_eq!(use_resolved_user(None), ResolvedUser::Missing);
    assert_eq!(use_auth_info(None), AuthInfo::default());

    let mut tracker = AuthChangeTracker::new();
    assert_eq!(use_auth_change(None, &mut tracker), (AuthView::default(), None));
}

#[test]
fn unloaded_store_reports_401_and_cached_user() {
    let (store, _bridge) = store_with(ada(), Some(User::new(3, "cached")));
    assert_eq!(use_auth(Some(&store)).status, 401);
    assert_eq!(use_user(Some(&store)).unwrap().username, "cached");
}

#[test]
fn cached_user_never_implies_authentication() {
    let (store, _bridge) = store_with(ada(), Some(User::new(3, "cached")));
    let info = use_auth_info(Some(&store));
    assert!(!info.is_authenticated);
    assert!(info.user.is_none());
}

#[tokio::test]
async fn loaded_store_exposes_snapshot_and_config() {
    let (store, _bridge) = store_with(ada(), None);
    store.load().await;

    let (view, info) = use_auth_status(Some(&store));
    assert_eq!(view.status, 200);
    assert!(info.is_authenticated);
    assert_eq!(info.user.unwrap().username, "ada");
    assert!(use_config(Some(&store)).unwrap().is_ok());
}

#[tokio::test]
async fn authenticated_snapshot_without_user_falls_back_to_cache() {
    let bare = resp(serde_json::json!({ "status": 200, "data": { "methods": [] } }));
    let (store, _bridge) = store_with(bare, Some(User::new(3, "cached")));
    store.load().await;

    let info = use_auth_info(Some(&store));
    assert!(info.is_authenticated);
    assert_eq!(info.user.unwrap().username, "cached");
}

#[tokio::test]
async fn resolved_user_prefers_live_state() {
    let (store, _bridge) = store_with(ada(), Some(User::new(3, "cached")));
    assert!(use_resolved_user(Some(&store)).is_cached());

    store.load().await;
    assert_eq!(use_resolved_user(Some(&store)), ResolvedUser::Live(User::new(7, "ada")));
}

#[tokio::test]
async fn change_is_reported_on_the_next_read_only() {
    let (store, bridge) = store_with(anonymous(), None);
    store.load().await;
    let mut tracker = AuthChangeTracker::new();

    let (_, first) = use_auth_change(Some(&store), &mut tracker);
    assert_eq!(first, None);

    bridge.auth_changed().publish(&Arc::new(ada()));
    let (view, second) = use_auth_change(Some(&store), &mut tracker);
    assert_eq!(view.status, 200);
    assert_eq!(second, Some(AuthChangeEvent::LoggedIn));

    let (_, third) = use_auth_change(Some(&store), &mut tracker);
    assert_eq!(third, None);
}
