use std::collections::HashMap;

use http::{HeaderMap, HeaderValue, header};

use grelay_core::{AuthKeyEntry, AuthProvider, AuthRejection, AuthSnapshot, MemoryAuth};

fn snapshot_with(key: &str, key_id: i64, user_id: i64, enabled: bool) -> AuthSnapshot {
    let mut keys_by_value = HashMap::new();
    keys_by_value.insert(
        key.to_string(),
        AuthKeyEntry {
            key_id,
            user_id,
            enabled,
        },
    );
    AuthSnapshot { keys_by_value }
}

fn bearer_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
}

#[test]
fn bearer_token_resolves_to_principal() {
    let auth = MemoryAuth::new(snapshot_with("k1", 3, 7, true));

    let principal = auth.authenticate(&bearer_headers("k1")).unwrap();
    assert_eq!(principal.user_id, "7");
    assert_eq!(principal.key_id, 3);
}

#[test]
fn bearer_scheme_is_case_insensitive() {
    let auth = MemoryAuth::new(snapshot_with("k1", 3, 7, true));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("bearer k1"),
    );
    assert!(auth.authenticate(&headers).is_ok());
}

#[test]
fn x_api_key_header_is_accepted() {
    let auth = MemoryAuth::new(snapshot_with("k1", 3, 7, true));

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_static("k1"));
    assert!(auth.authenticate(&headers).is_ok());
}

#[test]
fn rejections_carry_their_reason() {
    let auth = MemoryAuth::new(snapshot_with("k1", 3, 7, false));

    let err = auth.authenticate(&HeaderMap::new()).unwrap_err();
    assert_eq!(err, AuthRejection::MissingKey);

    let err = auth.authenticate(&bearer_headers("nope")).unwrap_err();
    assert_eq!(err, AuthRejection::UnknownKey);

    let err = auth.authenticate(&bearer_headers("k1")).unwrap_err();
    assert_eq!(err, AuthRejection::KeyDisabled);
}

#[test]
fn replace_snapshot_takes_effect_immediately() {
    let auth = MemoryAuth::new(snapshot_with("old", 1, 7, true));
    assert!(auth.authenticate(&bearer_headers("old")).is_ok());

    auth.replace_snapshot(snapshot_with("new", 2, 7, true));
    assert_eq!(
        auth.authenticate(&bearer_headers("old")).unwrap_err(),
        AuthRejection::UnknownKey
    );
    assert!(auth.authenticate(&bearer_headers("new")).is_ok());
}
