use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&UserUpdated) + Send + Sync>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_for_make = log.clone();
    let make = move |tag: &str| -> Box<dyn Fn(&UserUpdated) + Send + Sync> {
        let log = log_for_make.clone();
        let tag = tag.to_owned();
        Box::new(move |event: &UserUpdated| log.lock().unwrap().push(format!("{tag}:{}", event.user.username)))
    };
    (log, make)
}

fn updated(name: &str) -> UserUpdated {
    UserUpdated { user: User::new(1, name) }
}

// =============================================================================
// publish / subscribe
// =============================================================================

#[test]
fn publish_without_listeners_is_noop() {
    let bridge = EventBridge::new();
    assert_eq!(bridge.user_updated().publish(&updated("ada")), 0);
    assert_eq!(bridge.auth_changed().publish(&Arc::new(AuthResponse::with_status(410))), 0);
}

#[test]
fn listeners_run_in_subscription_order() {
    let bridge = EventBridge::new();
    let (log, make) = recorder();
    let _a = bridge.user_updated().subscribe(make("a"));
    let _b = bridge.user_updated().subscribe(make("b"));
    let _c = bridge.user_updated().subscribe(make("c"));

    assert_eq!(bridge.user_updated().publish(&updated("ada")), 3);
    assert_eq!(*log.lock().unwrap(), vec!["a:ada", "b:ada", "c:ada"]);
}

#[test]
fn dropping_subscription_unsubscribes() {
    let bridge = EventBridge::new();
    let (log, make) = recorder();
    let a = bridge.user_updated().subscribe(make("a"));
    let _b = bridge.user_updated().subscribe(make("b"));
    drop(a);

    bridge.user_updated().publish(&updated("ada"));
    assert_eq!(*log.lock().unwrap(), vec!["b:ada"]);
    assert_eq!(bridge.user_updated().listener_count(), 1);
}

#[test]
fn explicit_unsubscribe_matches_drop() {
    let bridge = EventBridge::new();
    let sub = bridge.user_updated().subscribe(|_| {});
    assert_eq!(sub.channel(), USER_UPDATED_EVENT);
    sub.unsubscribe();
    assert_eq!(bridge.user_updated().listener_count(), 0);
}

#[test]
fn clones_share_listeners() {
    let bridge = EventBridge::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in = hits.clone();
    let _sub = bridge.auth_changed().subscribe(move |_| {
        hits_in.fetch_add(1, Ordering::SeqCst);
    });

    let other = bridge.clone();
    other.auth_changed().publish(&Arc::new(AuthResponse::with_status(401)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn subscription_outliving_channel_drops_cleanly() {
    let sub = {
        let channel: Channel<u32> = Channel::new("scratch");
        channel.subscribe(|_| {})
    };
    drop(sub);
}

// =============================================================================
// re-entrancy
// =============================================================================

#[test]
fn listener_may_publish_on_another_channel() {
    let bridge = EventBridge::new();
    let (log, make) = recorder();
    let _leaf = bridge.user_updated().subscribe(make("leaf"));

    let forward = bridge.clone();
    let _relay = bridge.auth_changed().subscribe(move |resp: &Arc<AuthResponse>| {
        if let Some(user) = resp.user() {
            forward.user_updated().publish(&UserUpdated { user: user.clone() });
        }
    });

    let resp: AuthResponse = serde_json::from_value(serde_json::json!({
        "status": 200, "data": { "user": { "id": 1, "username": "ada" } }
    }))
    .unwrap();
    bridge.auth_changed().publish(&Arc::new(resp));
    assert_eq!(*log.lock().unwrap(), vec!["leaf:ada"]);
}

#[test]
fn listener_subscribing_during_publish_sees_next_publish_only() {
    let channel: Channel<u32> = Channel::new("scratch");
    let late_hits = Arc::new(AtomicUsize::new(0));
    let held: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

    let channel_in = channel.clone();
    let late_in = late_hits.clone();
    let held_in = held.clone();
    let _first = channel.subscribe(move |_| {
        let late = late_in.clone();
        let sub = channel_in.subscribe(move |_| {
            late.fetch_add(1, Ordering::SeqCst);
        });
        held_in.lock().unwrap().push(sub);
    });

    assert_eq!(channel.publish(&1), 1);
    assert_eq!(late_hits.load(Ordering::SeqCst), 0);
    channel.publish(&2);
    assert_eq!(late_hits.load(Ordering::SeqCst), 1);
}
