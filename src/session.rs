//! Session credential storage.
//!
//! The login flow itself lives outside this crate; checkout only needs an
//! opaque bearer token and a "currently authenticated" flag. The token is
//! mirrored into `local_store` so it survives a reload, matching the
//! frontend's durable `token` / `isAuthenticated` keys.

use tracing::info;

use crate::db::{self, DbState};

const KEY_TOKEN: &str = "token";
const KEY_IS_AUTHENTICATED: &str = "isAuthenticated";

/// Retrieve the stored bearer token, if any.
pub fn token(db: &DbState) -> Option<String> {
    db::kv_get(db, KEY_TOKEN).filter(|t| !t.trim().is_empty())
}

/// Store the bearer token obtained from the login flow.
pub fn set_token(db: &DbState, token: &str) -> Result<(), String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err("Cannot store an empty token".to_string());
    }
    db::kv_put(db, KEY_TOKEN, trimmed)?;
    db::kv_put(db, KEY_IS_AUTHENTICATED, "true")?;
    Ok(())
}

/// True when a non-empty token is present.
pub fn is_authenticated(db: &DbState) -> bool {
    token(db).is_some()
}

/// Drop the stored session.
pub fn clear_session(db: &DbState) -> Result<(), String> {
    db::kv_delete(db, KEY_TOKEN)?;
    db::kv_delete(db, KEY_IS_AUTHENTICATED)?;
    info!("Session cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        crate::db::run_migrations_for_test(&conn);
        DbState {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let db = test_db();
        assert!(!is_authenticated(&db));

        set_token(&db, "opaque-bearer-credential").unwrap();
        assert!(is_authenticated(&db));
        assert_eq!(token(&db).as_deref(), Some("opaque-bearer-credential"));

        clear_session(&db).unwrap();
        assert!(!is_authenticated(&db));
        assert_eq!(token(&db), None);
    }

    #[test]
    fn test_empty_token_rejected() {
        let db = test_db();
        assert!(set_token(&db, "   ").is_err());
        assert!(!is_authenticated(&db));
    }
}
