use std::sync::Arc;

use crate::error::AppError;
use crate::repositories::{ResetTokenError, UserStore};
use crate::services::email::{Mailer, PASSWORD_RESET_SUBJECT, password_reset_email_body};
use crate::services::password::hash_password;
use crate::services::reset_token::ResetTokenService;

/// パスワードリセットサービス
#[derive(Clone)]
pub struct PasswordResetService {
    user_store: Arc<dyn UserStore>,
    reset_tokens: ResetTokenService,
    mailer: Arc<dyn Mailer>,
    reset_url_base: String,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(
        user_store: Arc<dyn UserStore>,
        reset_tokens: ResetTokenService,
        mailer: Arc<dyn Mailer>,
        reset_url_base: String,
    ) -> Self {
        Self {
            user_store,
            reset_tokens,
            mailer,
            reset_url_base,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// # Security
    /// - ユーザーが存在しない場合も常に成功を返す（情報漏洩防止）
    /// - メール送信失敗は内部エラーとして返す（列挙対策の対象外）
    /// - トークン（平文）はログに出力しない
    pub async fn request_reset(&self, email: &str) -> Result<(), AppError> {
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        let user = match self.user_store.find_by_email(email).await? {
            Some(u) => u,
            None => {
                tracing::info!(email = %email, "パスワードリセット: ユーザー不在（成功レスポンス返却）");
                return Ok(());
            }
        };

        let token = self.reset_tokens.create(user.id).await.map_err(|e| {
            tracing::error!(error = ?e, user_id = %user.id, "リセットトークン保存エラー");
            AppError::Internal(anyhow::anyhow!("reset token store error"))
        })?;

        let reset_url = self.build_reset_url(&token);

        self.mailer
            .send(
                &user.email,
                PASSWORD_RESET_SUBJECT,
                &password_reset_email_body(&reset_url),
            )
            .await?;

        tracing::info!(user_id = %user.id, "パスワードリセットメール送信完了");

        Ok(())
    }

    /// パスワードをリセット
    ///
    /// # Security
    /// - トークン・新パスワードはログに出力しない
    pub async fn confirm_reset(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        // ハッシュ化はトークン消費より前に行う
        let password_hash = hash_password(new_password)?;

        let user_id = self.reset_tokens.redeem(token).await.map_err(|e| match e {
            ResetTokenError::NotFound => {
                tracing::warn!("リセットトークン不在");
                AppError::InvalidOrExpiredToken
            }
            ResetTokenError::Expired => {
                tracing::warn!("期限切れトークン");
                AppError::InvalidOrExpiredToken
            }
            ResetTokenError::Database(e) => AppError::Database(e),
        })?;

        if let Err(e) = self
            .user_store
            .update_password_hash(user_id, &password_hash)
            .await
        {
            // トークンは消費済みのため、ユーザーは再リクエストが必要
            tracing::error!(
                user_id = %user_id,
                error = ?e,
                "パスワード更新に失敗（リセットトークンは消費済み）"
            );
            return Err(e.into());
        }

        tracing::info!(user_id = %user_id, "パスワードリセット完了");

        Ok(())
    }

    /// リセットURLを構築
    fn build_reset_url(&self, token: &str) -> String {
        format!("{}?token={}", self.reset_url_base, token)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::repositories::{MemoryResetTokenStore, MemoryUserStore};
    use crate::services::auth::{AuthService, NewAccount};
    use crate::services::email::RecordingMailer;
    use crate::services::token::TokenService;

    struct Fixture {
        auth: AuthService,
        reset: PasswordResetService,
        tokens: MemoryResetTokenStore,
        mailer: RecordingMailer,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserStore::new());
        let tokens = MemoryResetTokenStore::new();
        let mailer = RecordingMailer::new();
        let auth = AuthService::new(
            users.clone(),
            TokenService::new(b"secret", Duration::hours(24)),
        );
        let reset = PasswordResetService::new(
            users,
            ResetTokenService::new(Arc::new(tokens.clone()), Duration::hours(24)),
            Arc::new(mailer.clone()),
            "http://localhost:3000/reset-password".to_string(),
        );
        Fixture {
            auth,
            reset,
            tokens,
            mailer,
        }
    }

    async fn register_alice(fixture: &Fixture) {
        fixture
            .auth
            .register(NewAccount {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
            })
            .await
            .unwrap();
    }

    fn token_from_mail(body: &str) -> String {
        body.split("?token=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_failed_password_update_reports_error_and_consumes_token() {
        let fixture = fixture();
        let issuer = ResetTokenService::new(Arc::new(fixture.tokens.clone()), Duration::hours(24));
        // ストアに存在しないユーザーのトークン
        let token = issuer.create(uuid::Uuid::new_v4()).await.unwrap();

        let result = fixture.reset.confirm_reset(&token, "newpassword456").await;
        assert!(matches!(result, Err(AppError::NotFound)));
        assert!(fixture.tokens.is_empty().await);

        let retry = fixture.reset.confirm_reset(&token, "newpassword456").await;
        assert!(matches!(retry, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_unknown_email_succeeds_without_side_effects() {
        let fixture = fixture();
        fixture
            .reset
            .request_reset("nobody@example.com")
            .await
            .unwrap();

        assert!(fixture.tokens.is_empty().await);
        assert!(fixture.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reset_roundtrip_changes_password() {
        let fixture = fixture();
        register_alice(&fixture).await;

        fixture
            .reset
            .request_reset("alice@example.com")
            .await
            .unwrap();

        let sent = fixture.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert_eq!(sent[0].subject, PASSWORD_RESET_SUBJECT);
        assert!(
            sent[0]
                .body
                .contains("http://localhost:3000/reset-password?token=")
        );

        let token = token_from_mail(&sent[0].body);
        fixture
            .reset
            .confirm_reset(&token, "newpassword456")
            .await
            .unwrap();

        assert!(matches!(
            fixture.auth.login("alice@example.com", "password123").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(
            fixture
                .auth
                .login("alice@example.com", "newpassword456")
                .await
                .is_ok()
        );

        // 再利用は不可
        assert!(matches!(
            fixture.reset.confirm_reset(&token, "anotherpass789").await,
            Err(AppError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid_or_expired() {
        let fixture = fixture();
        let result = fixture
            .reset
            .confirm_reset("no-such-token", "newpassword456")
            .await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_mail_failure_is_reported() {
        let fixture = fixture();
        register_alice(&fixture).await;
        fixture.mailer.fail_sends(true);

        let result = fixture.reset.request_reset("alice@example.com").await;
        assert!(matches!(result, Err(AppError::Mail(_))));
    }
}
