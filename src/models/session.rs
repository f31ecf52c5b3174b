//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login token issued to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token sent back as `auth_token`
    pub token: String,
    /// Associated user ID
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Issue a fresh random token for `user_id`, valid for `days` days.
    pub fn issue(user_id: i64, days: i64) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at: now + Duration::days(days),
            created_at: now,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_sets_expiry_and_unique_token() {
        let a = Session::issue(1, 7);
        let b = Session::issue(1, 7);

        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 32);
        assert!(!a.is_expired());
        assert!(a.expires_at > a.created_at + Duration::days(6));
    }

    #[test]
    fn test_is_expired() {
        let mut session = Session::issue(1, 7);
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
    }
}
