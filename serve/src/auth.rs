//! Optional bearer-token client authentication. When `CLIENT_API_KEY` is
//! unset, every request is accepted; when set, the `Authorization: Bearer
//! <token>` header (or `X-API-Key`) must match it, compared in constant time
//! so a timing side channel cannot leak the key a byte at a time.

use axum::http::HeaderMap;
use subtle::{Choice, ConstantTimeEq};

use crate::error::ApiError;

pub fn check(client_api_key: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = client_api_key else {
        return Ok(());
    };
    let provided = bearer_token(headers);
    match provided {
        Some(token) if tokens_equal(&token, expected) => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(raw) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = raw.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    headers.get("x-api-key")?.to_str().ok().map(str::to_string)
}

/// Constant-time string equality: always walks `max(len_a, len_b)` byte
/// positions regardless of where the two strings first differ, so neither a
/// length mismatch nor a late differing byte short-circuits the comparison.
fn tokens_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let len_eq = (a.len() as u64).ct_eq(&(b.len() as u64));
    let max_len = a.len().max(b.len());
    let mut bytes_eq = Choice::from(1u8);
    for i in 0..max_len {
        let ab = a.get(i).copied().unwrap_or(0);
        let bb = b.get(i).copied().unwrap_or(0);
        bytes_eq &= ab.ct_eq(&bb);
    }
    bool::from(len_eq & bytes_eq)
}
