use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use parley_db::{Database, queries};
use rand::RngCore;
use tracing::info;

use crate::authz::AuthorizationGuard;
use crate::error::{CoreError, CoreResult};
use crate::media;
use crate::photos::PhotoStore;

const NAME_MIN_CHARS: usize = 3;
const NAME_MAX_CHARS: usize = 16;

/// Result of a login: the resolved user plus a freshly minted session
/// token. Tokens are opaque (32 random bytes, base64url) and stay valid
/// until the session row is removed; the core defines no expiry.
#[derive(Debug, Clone)]
pub struct Login {
    pub user_id: String,
    pub token: String,
}

#[derive(Clone)]
pub struct IdentityStore {
    db: Arc<Database>,
    photos: Arc<dyn PhotoStore>,
}

impl IdentityStore {
    pub fn new(db: Arc<Database>, photos: Arc<dyn PhotoStore>) -> Self {
        Self { db, photos }
    }

    /// Log in under `candidate_id`, creating the user on first sight. An
    /// existing user gets a fresh token; the supplied display name is only
    /// used at creation time.
    pub fn login_or_create(&self, candidate_id: &str, display_name: &str) -> CoreResult<Login> {
        if candidate_id.is_empty() {
            return Err(CoreError::Validation("user id must not be empty".into()));
        }
        validate_display_name(display_name)?;

        self.db.transaction(|tx| {
            let now = Utc::now().to_rfc3339();
            if queries::get_user(tx, candidate_id)?.is_none() {
                queries::insert_user(tx, candidate_id, display_name, &now)?;
                info!("created user {candidate_id}");
            }

            let token = mint_token();
            queries::insert_session(tx, &token, candidate_id, &now)?;

            Ok(Login {
                user_id: candidate_id.to_string(),
                token,
            })
        })
    }

    pub fn rename_user(&self, user_id: &str, new_name: &str) -> CoreResult<()> {
        validate_display_name(new_name)?;

        self.db.transaction(|tx| {
            let changed = queries::update_user_name(tx, user_id, new_name)?;
            if changed == 0 {
                return Err(CoreError::NotFound(format!("user {user_id} not found")));
            }
            Ok(())
        })
    }

    /// Validate and store a profile photo; records the blob-store
    /// reference on the user row and returns it.
    pub fn set_user_photo(
        &self,
        user_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> CoreResult<String> {
        let ext = media::validate_photo(filename, bytes)?;
        let reference = self.photos.store(user_id, &ext, bytes)?;

        self.db.transaction(|tx| {
            let changed = queries::update_user_photo(tx, user_id, &reference)?;
            if changed == 0 {
                return Err(CoreError::NotFound(format!("user {user_id} not found")));
            }
            Ok(reference)
        })
    }

    /// Resolve a session token to its user id.
    pub fn validate_token(&self, token: &str) -> CoreResult<String> {
        self.db
            .with_conn(|conn| AuthorizationGuard::resolve_token(conn, token))
    }
}

fn validate_display_name(name: &str) -> CoreResult<()> {
    let chars = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(CoreError::Validation(format!(
            "display name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::core;

    #[test]
    fn login_creates_user_and_token() {
        let core = core();
        let login = core.identity.login_or_create("a1", "Alice").unwrap();

        assert_eq!(login.user_id, "a1");
        assert!(!login.token.is_empty());
        assert_eq!(core.identity.validate_token(&login.token).unwrap(), "a1");
    }

    #[test]
    fn login_existing_user_issues_fresh_token() {
        let core = core();
        let first = core.identity.login_or_create("a1", "Alice").unwrap();
        let second = core.identity.login_or_create("a1", "Someone").unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_ne!(first.token, second.token);
        // both tokens stay valid, there is no expiry
        assert_eq!(core.identity.validate_token(&first.token).unwrap(), "a1");
        assert_eq!(core.identity.validate_token(&second.token).unwrap(), "a1");
    }

    #[test]
    fn login_rejects_bad_input() {
        let core = core();
        assert!(matches!(
            core.identity.login_or_create("", "Alice"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            core.identity.login_or_create("a1", ""),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            core.identity.login_or_create("a1", "ab"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn validate_token_rejects_unknown() {
        let core = core();
        assert!(matches!(
            core.identity.validate_token("no-such-token"),
            Err(CoreError::Unauthorized(_))
        ));
        assert!(matches!(
            core.identity.validate_token(""),
            Err(CoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn rename_enforces_length_bounds() {
        let core = core();
        core.login("a1", "Alice");

        assert!(matches!(
            core.identity.rename_user("a1", "ab"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            core.identity.rename_user("a1", "a-name-that-is-way-too-long"),
            Err(CoreError::Validation(_))
        ));
        core.identity.rename_user("a1", "Ali").unwrap();
        core.identity.rename_user("a1", "exactly16chars!!").unwrap();
    }

    #[test]
    fn rename_unknown_user_is_not_found() {
        let core = core();
        assert!(matches!(
            core.identity.rename_user("ghost", "Casper"),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn photo_validation_outcomes() {
        let core = core();
        core.login("a1", "Alice");

        let reference = core
            .identity
            .set_user_photo("a1", "selfie.png", b"not-really-a-png")
            .unwrap();
        assert_eq!(reference, "a1.png");

        assert!(matches!(
            core.identity.set_user_photo("a1", "selfie.gif", b"gif"),
            Err(CoreError::UnsupportedMedia(_))
        ));

        let oversized = vec![0u8; media::MAX_PHOTO_BYTES + 1];
        assert!(matches!(
            core.identity.set_user_photo("a1", "selfie.jpg", &oversized),
            Err(CoreError::PayloadTooLarge { .. })
        ));
    }
}
