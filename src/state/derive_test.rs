use super::*;
use crate::net::types::UserId;

fn resp(json: serde_json::Value) -> AuthResponse {
    serde_json::from_value(json).unwrap()
}

fn anonymous() -> AuthResponse {
    resp(serde_json::json!({ "status": 401, "meta": { "is_authenticated": false } }))
}

fn signed_in(id: i64, methods: usize) -> AuthResponse {
    let methods: Vec<&str> = std::iter::repeat_n("password", methods).collect();
    resp(serde_json::json!({
        "status": 200,
        "meta": { "is_authenticated": true },
        "data": { "user": { "id": id, "username": format!("user{id}") }, "methods": methods }
    }))
}

fn reauth_required(id: i64) -> AuthResponse {
    resp(serde_json::json!({
        "status": 401,
        "meta": { "is_authenticated": true },
        "data": { "user": { "id": id }, "methods": ["password"], "flows": [{ "id": "reauthenticate" }] }
    }))
}

fn pending(flow: &str) -> AuthResponse {
    resp(serde_json::json!({
        "status": 401,
        "meta": { "is_authenticated": false },
        "data": { "flows": [{ "id": flow, "is_pending": true }] }
    }))
}

// =============================================================================
// derive_info
// =============================================================================

#[test]
fn missing_response_is_anonymous() {
    assert_eq!(derive_info(None), AuthInfo::default());
}

#[test]
fn status_200_is_authenticated() {
    let info = derive_info(Some(&signed_in(7, 1)));
    assert!(info.is_authenticated);
    assert!(!info.requires_reauthentication);
    assert_eq!(info.user.unwrap().username, "user7");
    assert!(info.pending_flow.is_none());
}

#[test]
fn status_401_with_authenticated_meta_requires_reauthentication() {
    let info = derive_info(Some(&reauth_required(7)));
    assert!(info.is_authenticated);
    assert!(info.requires_reauthentication);
}

#[test]
fn plain_401_is_anonymous_and_exposes_pending_flow() {
    let info = derive_info(Some(&pending("signup")));
    assert!(!info.is_authenticated);
    assert!(!info.requires_reauthentication);
    assert!(info.user.is_none());
    assert_eq!(info.pending_flow.unwrap().id, "signup");
}

#[test]
fn derivation_is_idempotent() {
    for r in [anonymous(), signed_in(1, 2), reauth_required(3), pending("login"), AuthResponse::with_status(410)] {
        assert_eq!(derive_info(Some(&r)), derive_info(Some(&r)));
    }
}

#[test]
fn fallback_fills_missing_user_when_authenticated() {
    let r = resp(serde_json::json!({ "status": 200, "data": { "methods": [] } }));
    let info = derive_info_with_fallback(Some(&r), || Some(User::new(9, "cached")));
    assert_eq!(info.user.unwrap().username, "cached");
}

#[test]
fn fallback_never_invents_authentication() {
    let info = derive_info_with_fallback(Some(&anonymous()), || panic!("fallback must not run"));
    assert!(!info.is_authenticated);
    assert!(info.user.is_none());

    let info = derive_info_with_fallback(None, || Some(User::new(9, "cached")));
    assert!(!info.is_authenticated);
    assert!(info.user.is_none());
}

#[test]
fn live_user_wins_over_fallback() {
    let info = derive_info_with_fallback(Some(&signed_in(7, 0)), || Some(User::new(9, "cached")));
    assert_eq!(info.user.unwrap().id, UserId::Int(7));
}

// =============================================================================
// classify_transition
// =============================================================================

#[test]
fn unchanged_snapshot_yields_no_event() {
    for r in [anonymous(), signed_in(1, 1), reauth_required(1), pending("login"), AuthResponse::with_status(410)] {
        assert_eq!(classify_transition(&r, &r.clone()), None);
    }
}

#[test]
fn gone_dominates_every_other_rule() {
    let gone = AuthResponse::with_status(410);
    for from in [anonymous(), signed_in(1, 1), reauth_required(1), pending("login")] {
        assert_eq!(classify_transition(&from, &gone), Some(AuthChangeEvent::LoggedOut));
    }
}

#[test]
fn user_switch_is_a_login() {
    let from = resp(serde_json::json!({ "status": 200, "data": { "user": { "id": 1 } } }));
    let to = resp(serde_json::json!({ "status": 200, "data": { "user": { "id": 2 } } }));
    assert_eq!(classify_transition(&from, &to), Some(AuthChangeEvent::LoggedIn));
}

#[test]
fn user_switch_into_reauth_required_is_still_a_login() {
    assert_eq!(classify_transition(&signed_in(1, 1), &reauth_required(2)), Some(AuthChangeEvent::LoggedIn));
}

#[test]
fn anonymous_to_authenticated_is_login() {
    let to = resp(serde_json::json!({
        "status": 200,
        "data": { "user": { "id": 7, "username": "ada" }, "methods": [] }
    }));
    assert_eq!(classify_transition(&anonymous(), &to), Some(AuthChangeEvent::LoggedIn));
}

#[test]
fn authenticated_to_anonymous_is_logout() {
    assert_eq!(classify_transition(&signed_in(7, 1), &anonymous()), Some(AuthChangeEvent::LoggedOut));
}

#[test]
fn mid_session_reauth_required() {
    let from = resp(serde_json::json!({ "status": 200, "data": { "user": { "id": 7 }, "methods": ["password"] } }));
    let to = resp(serde_json::json!({
        "status": 401,
        "meta": { "is_authenticated": true },
        "data": { "user": { "id": 7 }, "methods": ["password"] }
    }));
    assert_eq!(classify_transition(&from, &to), Some(AuthChangeEvent::ReauthenticationRequired));
}

#[test]
fn leaving_reauth_required_is_reauthenticated() {
    assert_eq!(classify_transition(&reauth_required(7), &signed_in(7, 1)), Some(AuthChangeEvent::Reauthenticated));
}

#[test]
fn growing_method_count_is_reauthenticated() {
    assert_eq!(classify_transition(&signed_in(7, 1), &signed_in(7, 2)), Some(AuthChangeEvent::Reauthenticated));
}

#[test]
fn same_user_other_field_change_is_silent() {
    let from = signed_in(7, 1);
    let mut to = from.clone();
    to.data.as_mut().unwrap().user.as_mut().unwrap().username = "renamed".into();
    assert_eq!(classify_transition(&from, &to), None);
}

#[test]
fn anonymous_flow_change_is_flow_updated() {
    assert_eq!(classify_transition(&pending("login"), &pending("signup")), Some(AuthChangeEvent::FlowUpdated));
}

#[test]
fn first_pending_flow_is_flow_updated() {
    assert_eq!(classify_transition(&anonymous(), &pending("login")), Some(AuthChangeEvent::FlowUpdated));
}

#[test]
fn dropping_pending_flow_is_silent() {
    assert_eq!(classify_transition(&pending("login"), &anonymous()), None);
}

#[test]
fn event_names_match_wire_constants() {
    assert_eq!(AuthChangeEvent::LoggedOut.to_string(), "LOGGED_OUT");
    assert_eq!(AuthChangeEvent::ReauthenticationRequired.as_str(), "REAUTHENTICATION_REQUIRED");
    assert_eq!(AuthChangeEvent::FlowUpdated.as_str(), "FLOW_UPDATED");
}
