use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{
    PasswordResetTokenRepository, ResetTokenStore, UserRepository, UserStore,
};
use crate::services::{
    AuthService, LogMailer, Mailer, PasswordResetService, ResetTokenService, TokenService,
};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// ユーザーストア
    pub user_store: Arc<dyn UserStore>,
    /// セッショントークンサービス
    pub token_service: TokenService,
    /// 認証サービス（登録・ログイン）
    pub auth_service: AuthService,
    /// パスワードリセットサービス
    pub password_reset_service: PasswordResetService,
}

/// ストア・メーラー以外の構成値
#[derive(Debug, Clone)]
pub struct StateSettings {
    pub reset_url_base: String,
    pub password_reset_token_ttl: Duration,
}

impl AppState {
    /// PostgreSQL と設定から AppState を作成
    pub fn new(db_pool: PgPool, config: &Config) -> Result<Self, AppError> {
        let user_store: Arc<dyn UserStore> = Arc::new(UserRepository::new(db_pool.clone()));
        let reset_store: Arc<dyn ResetTokenStore> =
            Arc::new(PasswordResetTokenRepository::new(db_pool));
        let mailer = build_mailer(config)?;

        let token_service = TokenService::new(
            config.jwt_secret.expose_secret().as_bytes(),
            Duration::seconds(config.session_token_ttl_secs),
        );

        Ok(Self::from_parts(
            user_store,
            reset_store,
            mailer,
            token_service,
            StateSettings {
                reset_url_base: config.password_reset_url_base.clone(),
                password_reset_token_ttl: Duration::seconds(config.password_reset_token_ttl_secs),
            },
        ))
    }

    /// 任意のストア・メーラーから AppState を組み立てる
    pub fn from_parts(
        user_store: Arc<dyn UserStore>,
        reset_store: Arc<dyn ResetTokenStore>,
        mailer: Arc<dyn Mailer>,
        token_service: TokenService,
        settings: StateSettings,
    ) -> Self {
        let auth_service = AuthService::new(user_store.clone(), token_service.clone());
        let password_reset_service = PasswordResetService::new(
            user_store.clone(),
            ResetTokenService::new(reset_store, settings.password_reset_token_ttl),
            mailer,
            settings.reset_url_base,
        );

        Self {
            user_store,
            token_service,
            auth_service,
            password_reset_service,
        }
    }
}

/// SMTP 設定が揃っていれば SMTP、なければログ出力のみのメーラー
#[cfg(feature = "email")]
fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>, AppError> {
    use crate::services::email::SmtpMailer;

    match (
        &config.smtp_host,
        &config.smtp_username,
        &config.smtp_password,
        &config.smtp_from_address,
    ) {
        (Some(host), Some(username), Some(password), Some(from)) => {
            tracing::info!(smtp_host = %host, "SMTP メーラーを初期化");
            let mailer = SmtpMailer::new(
                host,
                config.smtp_port,
                username.expose_secret().clone(),
                password.expose_secret().clone(),
                from.clone(),
            )?;
            Ok(Arc::new(mailer))
        }
        _ => {
            tracing::info!("SMTP 未設定（ログ出力のみ）");
            Ok(Arc::new(LogMailer))
        }
    }
}

#[cfg(not(feature = "email"))]
fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>, AppError> {
    if config.smtp_host.is_some() {
        tracing::warn!("SMTP 設定がありますが email 機能が無効です（ログ出力のみ）");
    }
    Ok(Arc::new(LogMailer))
}
