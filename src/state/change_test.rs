use super::*;

fn snapshot(json: serde_json::Value) -> Arc<AuthResponse> {
    Arc::new(serde_json::from_value(json).unwrap())
}

fn anonymous() -> Arc<AuthResponse> {
    snapshot(serde_json::json!({ "status": 401, "meta": { "is_authenticated": false } }))
}

fn ada() -> Arc<AuthResponse> {
    snapshot(serde_json::json!({ "status": 200, "data": { "user": { "id": 7, "username": "ada" }, "methods": [] } }))
}

#[test]
fn first_observation_is_baseline_only() {
    let mut tracker = AuthChangeTracker::new();
    assert_eq!(tracker.observe(Some(&ada())), None);
    assert!(tracker.previous().is_some());
}

#[test]
fn change_is_reported_once() {
    let first = anonymous();
    let second = ada();
    let mut tracker = AuthChangeTracker::new();

    assert_eq!(tracker.observe(Some(&first)), None);
    assert_eq!(tracker.observe(Some(&second)), Some(AuthChangeEvent::LoggedIn));
    assert_eq!(tracker.observe(Some(&second)), None);
}

#[test]
fn deep_equal_replacement_is_silent() {
    let mut tracker = AuthChangeTracker::starting_from(Some(ada()));
    assert_eq!(tracker.observe(Some(&ada())), None);
}

#[test]
fn previous_is_updated_even_without_event() {
    let mut tracker = AuthChangeTracker::starting_from(Some(ada()));
    let renamed = snapshot(serde_json::json!({ "status": 200, "data": { "user": { "id": 7, "username": "lovelace" } } }));

    assert_eq!(tracker.observe(Some(&renamed)), None);
    assert!(Arc::ptr_eq(tracker.previous().unwrap(), &renamed));
}

#[test]
fn missing_snapshot_resets_baseline() {
    let mut tracker = AuthChangeTracker::starting_from(Some(anonymous()));
    assert_eq!(tracker.observe(None), None);
    assert!(tracker.previous().is_none());
    // Nothing to compare against after a reset.
    assert_eq!(tracker.observe(Some(&ada())), None);
}

#[test]
fn sequence_of_transitions() {
    let mut tracker = AuthChangeTracker::starting_from(Some(anonymous()));
    let events: Vec<_> = [ada(), Arc::new(AuthResponse::with_status(410)), anonymous()]
        .iter()
        .map(|r| tracker.observe(Some(r)))
        .collect();
    assert_eq!(events, vec![Some(AuthChangeEvent::LoggedIn), Some(AuthChangeEvent::LoggedOut), None]);
}
