use std::sync::Arc;

use crate::error::AppError;
use crate::models::{NewUser, User, UserStatus};
use crate::repositories::UserStore;
use crate::services::password::{hash_password, verify_dummy_password, verify_password};
use crate::services::token::{SessionClaims, TokenService};

/// 新規アカウント登録パラメータ
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// 認証済みセッション（トークン + ユーザー）
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub claims: SessionClaims,
    pub user: User,
}

/// 認証サービス
#[derive(Clone)]
pub struct AuthService {
    user_store: Arc<dyn UserStore>,
    token_service: TokenService,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(user_store: Arc<dyn UserStore>, token_service: TokenService) -> Self {
        Self {
            user_store,
            token_service,
        }
    }

    /// ユーザー登録を実行
    ///
    /// 事前チェックをすり抜けた同時登録はストアの UNIQUE 制約で
    /// `EmailAlreadyExists` になる
    pub async fn register(&self, account: NewAccount) -> Result<AuthSession, AppError> {
        if self
            .user_store
            .find_by_email(&account.email)
            .await?
            .is_some()
        {
            tracing::warn!(email = %account.email, "登録失敗: メールアドレス重複");
            return Err(AppError::EmailAlreadyExists);
        }

        let password_hash = hash_password(&account.password)?;

        let user = self
            .user_store
            .insert(NewUser {
                email: account.email,
                password_hash,
                first_name: account.first_name,
                last_name: account.last_name,
                status: UserStatus::Active,
            })
            .await?;

        tracing::info!(user_id = %user.id, email = %user.email, "ユーザー登録成功");

        self.start_session(user)
    }

    /// ユーザー認証を実行
    ///
    /// ユーザー不在とパスワード不一致は同じ `InvalidCredentials` を返す
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let user = match self.user_store.find_by_email(email).await? {
            Some(user) => user,
            None => {
                verify_dummy_password(password);
                tracing::warn!(email = %email, "認証失敗: ユーザー不在");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(email = %email, "認証失敗: パスワード不一致");
            return Err(AppError::InvalidCredentials);
        }

        // 正しい資格情報を提示済みのため、無効化の旨は区別して返してよい
        if !user.is_active() {
            tracing::warn!(user_id = %user.id, status = ?user.status, "認証失敗: アカウント無効");
            return Err(AppError::AccountDisabled);
        }

        tracing::info!(user_id = %user.id, "認証成功");

        self.start_session(user)
    }

    fn start_session(&self, user: User) -> Result<AuthSession, AppError> {
        let issued = self.token_service.issue(user.id)?;
        Ok(AuthSession {
            token: issued.token,
            claims: issued.claims,
            user,
        })
    }
}
