//! Opaque identifier and timestamp helpers shared across the translation core.

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generates an opaque id of the form `<prefix>_<32 hex chars>`.
///
/// The prefix is semantic (`resp`, `item`, `call`, `req`, ...) but callers must
/// never parse the tail; it is random and carries no meaning.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_has_prefix_and_is_unique() {
        let a = new_id("resp");
        let b = new_id("resp");
        assert!(a.starts_with("resp_"));
        assert_ne!(a, b);
        assert_eq!(a.len(), "resp_".len() + 32);
    }

    #[test]
    fn now_ts_is_positive() {
        assert!(now_ts() > 0);
    }
}
