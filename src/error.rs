use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::repositories::UserStoreError;
use crate::services::email::MailError;
use crate::services::token::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("メールアドレスまたはパスワードが正しくありません")]
    InvalidCredentials,

    #[error("アカウントが無効化されています")]
    AccountDisabled,

    #[error("このメールアドレスは既に使用されています")]
    EmailAlreadyExists,

    #[error("無効または期限切れのリンクです")]
    InvalidOrExpiredToken,

    #[error("認証ヘッダーがありません")]
    MissingBearerToken,

    #[error("認証エラー: {0}")]
    Unauthorized(#[from] TokenError),

    #[error("リソースが見つかりません")]
    NotFound,

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("メール送信エラー")]
    Mail(#[from] MailError),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

impl From<UserStoreError> for AppError {
    fn from(e: UserStoreError) -> Self {
        match e {
            UserStoreError::DuplicateEmail => Self::EmailAlreadyExists,
            UserStoreError::NotFound => Self::NotFound,
            UserStoreError::Database(e) => Self::Database(e),
        }
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        Self::Validation(report.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "JSON ボディの拒否");
        Self::Validation(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            // ユーザー不在とパスワード不一致を区別しない（アカウント列挙対策）
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "メールアドレスまたはパスワードが正しくありません".to_string(),
            ),
            Self::AccountDisabled => (
                StatusCode::UNAUTHORIZED,
                "account_disabled",
                "アカウントが無効化されています".to_string(),
            ),
            Self::EmailAlreadyExists => (
                StatusCode::BAD_REQUEST,
                "duplicate_email",
                "このメールアドレスは既に使用されています".to_string(),
            ),
            Self::InvalidOrExpiredToken => (
                StatusCode::BAD_REQUEST,
                "invalid_or_expired_token",
                "無効または期限切れのリンクです".to_string(),
            ),
            Self::MissingBearerToken => {
                tracing::debug!("認証ヘッダーなし");
                unauthorized()
            }
            Self::Unauthorized(e) => {
                tracing::warn!(reason = %e, "トークン検証失敗");
                unauthorized()
            }
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                "リソースが見つかりません".to_string(),
            ),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                internal_error()
            }
            Self::Mail(e) => {
                tracing::error!(error = ?e, "メール送信エラー");
                internal_error()
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                internal_error()
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: code,
                message,
            }),
        )
            .into_response()
    }
}

fn unauthorized() -> (StatusCode, &'static str, String) {
    (
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "認証が必要です".to_string(),
    )
}

fn internal_error() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "内部エラーが発生しました".to_string(),
    )
}
