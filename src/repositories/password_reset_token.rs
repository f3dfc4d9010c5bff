use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::PasswordResetToken;

#[derive(Debug, thiserror::Error)]
pub enum ResetTokenError {
    #[error("reset token not found")]
    NotFound,

    #[error("reset token expired")]
    Expired,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// パスワードリセットトークン永続化ポート
///
/// トークンは SHA256 ハッシュ（token_hash）をキーに保存する
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn put(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), ResetTokenError>;

    /// トークンを取り出して削除する（検証と削除は不可分）
    ///
    /// - 存在しない: `NotFound`
    /// - `now >= expires_at`: `Expired`（レコードは同時に削除される）
    /// - それ以外: 所有ユーザーID
    async fn take_if_valid(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Uuid, ResetTokenError>;
}

#[derive(Clone)]
pub struct PasswordResetTokenRepository {
    pool: PgPool,
}

impl PasswordResetTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResetTokenStore for PasswordResetTokenRepository {
    /// # Arguments
    /// * `token_hash` - トークンのSHA256ハッシュ
    /// * `user_id` - 対象ユーザーのID
    /// * `expires_at` - 有効期限
    async fn put(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), ResetTokenError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 単一の DELETE ... RETURNING で取り出すため、同一トークンの
    /// 同時リクエストは片方のみ行を受け取る
    async fn take_if_valid(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Uuid, ResetTokenError> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            DELETE FROM password_reset_tokens
            WHERE token_hash = $1
            RETURNING token_hash, user_id, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ResetTokenError::NotFound)?;

        if token.is_expired_at(now) {
            return Err(ResetTokenError::Expired);
        }

        Ok(token.user_id)
    }
}
