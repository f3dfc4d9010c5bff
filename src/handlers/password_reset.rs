use axum::{Json, extract::State};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::ValidatedJson;
use crate::state::AppState;

// === リセットリクエスト ===

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequestRequest {
    #[garde(email)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /passwords/reset-request
///
/// # Security
/// 常に200を返す（ユーザー存在有無を漏洩しない）
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResetRequestRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .password_reset_service
        .request_reset(&request.email)
        .await?;

    Ok(Json(MessageResponse {
        message: "パスワードリセットメールを送信しました".to_string(),
    }))
}

// === パスワードリセット実行 ===

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[garde(length(min = 1))]
    pub token: String,
    #[garde(length(min = 8))]
    pub password: String,
}

/// POST /passwords/reset
///
/// # Security
/// - token, password はログに出力しない
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .password_reset_service
        .confirm_reset(&request.token, &request.password)
        .await?;

    Ok(Json(MessageResponse {
        message: "パスワードを更新しました".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_invalid_email() {
        let request = ResetRequestRequest {
            email: "invalid-email".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_empty_token() {
        let request = ResetPasswordRequest {
            token: "".to_string(),
            password: "password123".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_short_password() {
        let request = ResetPasswordRequest {
            token: "valid-token".to_string(),
            password: "short".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_valid_reset_request() {
        let request = ResetPasswordRequest {
            token: "valid-token".to_string(),
            password: "password123".to_string(),
        };
        assert!(request.validate().is_ok());
    }
}
