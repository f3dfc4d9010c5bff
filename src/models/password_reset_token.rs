use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// パスワードリセットトークン
///
/// トークン自体はハッシュ化してDBに保存（token_hash）
/// 平文トークンはユーザーにメールで送信し、DBには保存しない
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl PasswordResetToken {
    /// `now` 時点で期限切れかどうか
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = OffsetDateTime::now_utc();
        let token = PasswordResetToken {
            token_hash: "hash".to_string(),
            user_id: Uuid::new_v4(),
            expires_at: now,
            created_at: now - Duration::hours(24),
        };

        assert!(token.is_expired_at(now));
        assert!(!token.is_expired_at(now - Duration::seconds(1)));
    }
}
