use axum::{Json, extract::State};
use garde::Validate;
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::register::AuthResponse;
use crate::middleware::ValidatedJson;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// ユーザーのメールアドレス
    #[garde(email)]
    pub email: String,
    /// ユーザーのパスワード
    #[garde(length(min = 1))]
    pub password: String,
}

/// ログインハンドラー
///
/// POST /auth/login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. ユーザー認証（DB照合）
/// 3. セッショントークン発行
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state
        .auth_service
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(session.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_invalid_email() {
        let request = LoginRequest {
            email: "invalid-email".to_string(),
            password: "password123".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_empty_password() {
        let request = LoginRequest {
            email: "test@example.com".to_string(),
            password: "".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_valid_request() {
        let request = LoginRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(request.validate().is_ok());
    }
}
