//! Bearer-token decoding and per-request settings extraction
//!
//! The calling platform hands the relay a JWT whose payload carries the
//! upstream API key plus optional per-request overrides. Signature
//! validation happens at the platform boundary; the relay only decodes the
//! payload and extracts what it needs.

use axum::http::{HeaderMap, header};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;

use crate::config::Settings;
use crate::errors::RelayError;

pub const NO_AUTH_HEADER: &str = "Authorization header is missing";
pub const WRONG_AUTH_TYPE: &str = "Wrong authorization type";
pub const WRONG_JWT_STRUCTURE: &str = "Wrong JWT structure";
pub const WRONG_PAYLOAD_STRUCTURE: &str = "Wrong JWT payload structure";

/// Credentials and effective per-request settings.
#[derive(Debug, Clone)]
pub struct RequestAuth {
    /// Upstream API key extracted from the token payload.
    pub key: String,
    /// Result limit after applying the caller's override, if any.
    pub entities_limit: usize,
    /// Aggregation flag after applying the caller's override, if any.
    pub aggregate: bool,
}

/// Decode the request's bearer token and derive the effective settings.
pub fn authorize(headers: &HeaderMap, settings: &Settings) -> Result<RequestAuth, RelayError> {
    let token = bearer_token(headers)?;
    let payload = decode_payload(token)?;

    let key = payload
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| auth_error(WRONG_PAYLOAD_STRUCTURE))?
        .to_string();

    Ok(RequestAuth {
        key,
        entities_limit: entities_limit(&payload, settings),
        aggregate: aggregate(&payload, settings),
    })
}

fn auth_error(message: &str) -> RelayError {
    RelayError::Authorization(message.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, RelayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| auth_error(NO_AUTH_HEADER))?;
    let value = value.to_str().map_err(|_| auth_error(WRONG_AUTH_TYPE))?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(auth_error(WRONG_AUTH_TYPE)),
    }
}

fn decode_payload(token: &str) -> Result<Value, RelayError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(auth_error(WRONG_JWT_STRUCTURE));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| auth_error(WRONG_JWT_STRUCTURE))?;

    serde_json::from_slice(&bytes).map_err(|_| auth_error(WRONG_JWT_STRUCTURE))
}

/// Caller override for the result limit: accepted when a positive integer,
/// clamped to the configured ceiling, otherwise the default applies.
fn entities_limit(payload: &Value, settings: &Settings) -> usize {
    let requested = match payload.get("CTR_ENTITIES_LIMIT") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match requested {
        Some(n) if n > 0 => settings.clamp_entities_limit(n as usize),
        _ => settings.entities_limit_default,
    }
}

/// Caller override for aggregation: anything other than the string `false`
/// (case-insensitive) keeps aggregation on.
fn aggregate(payload: &Value, settings: &Settings) -> bool {
    match payload.get("AGGREGATE") {
        Some(value) => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            !text.eq_ignore_ascii_case("false")
        }
        None => settings.aggregate_default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_for(payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{payload}.signature")
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn extracts_key_and_defaults() {
        let token = token_for(json!({"key": "secret"}));
        let auth = authorize(&headers_with(&format!("Bearer {token}")), &Settings::default())
            .expect("valid token");

        assert_eq!(auth.key, "secret");
        assert_eq!(auth.entities_limit, 100);
        assert!(auth.aggregate);
    }

    #[test]
    fn payload_overrides_are_applied() {
        let token = token_for(json!({
            "key": "secret",
            "CTR_ENTITIES_LIMIT": 25,
            "AGGREGATE": "false",
        }));
        let auth = authorize(&headers_with(&format!("Bearer {token}")), &Settings::default())
            .expect("valid token");

        assert_eq!(auth.entities_limit, 25);
        assert!(!auth.aggregate);
    }

    #[test]
    fn oversized_limit_is_clamped_and_bad_limit_falls_back() {
        let settings = Settings::default();

        let token = token_for(json!({"key": "k", "CTR_ENTITIES_LIMIT": 100_000}));
        let auth = authorize(&headers_with(&format!("Bearer {token}")), &settings).unwrap();
        assert_eq!(auth.entities_limit, settings.entities_limit_max);

        let token = token_for(json!({"key": "k", "CTR_ENTITIES_LIMIT": "not a number"}));
        let auth = authorize(&headers_with(&format!("Bearer {token}")), &settings).unwrap();
        assert_eq!(auth.entities_limit, settings.entities_limit_default);
    }

    #[test]
    fn aggregate_accepts_bool_and_string_forms() {
        let settings = Settings::default();
        for (value, expected) in [
            (json!(false), false),
            (json!("False"), false),
            (json!(true), true),
            (json!("anything"), true),
        ] {
            let token = token_for(json!({"key": "k", "AGGREGATE": value}));
            let auth = authorize(&headers_with(&format!("Bearer {token}")), &settings).unwrap();
            assert_eq!(auth.aggregate, expected);
        }
    }

    #[test]
    fn missing_header_and_wrong_scheme_fail() {
        let settings = Settings::default();

        let error = authorize(&HeaderMap::new(), &settings).unwrap_err();
        assert_eq!(
            error.to_string(),
            format!("Authorization failed: {NO_AUTH_HEADER}")
        );

        let error = authorize(&headers_with("Basic abc"), &settings).unwrap_err();
        assert_eq!(
            error.to_string(),
            format!("Authorization failed: {WRONG_AUTH_TYPE}")
        );
    }

    #[test]
    fn malformed_tokens_fail() {
        let settings = Settings::default();

        for token in ["only-one-segment", "a.b", "a.!!!not-base64!!!.c"] {
            let error =
                authorize(&headers_with(&format!("Bearer {token}")), &settings).unwrap_err();
            assert_eq!(
                error.to_string(),
                format!("Authorization failed: {WRONG_JWT_STRUCTURE}")
            );
        }

        let token = token_for(json!({"no_key_here": true}));
        let error = authorize(&headers_with(&format!("Bearer {token}")), &settings).unwrap_err();
        assert_eq!(
            error.to_string(),
            format!("Authorization failed: {WRONG_PAYLOAD_STRUCTURE}")
        );
    }
}
