use axum::{Json, extract::State, http::StatusCode};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::users::UserResponse;
use crate::middleware::ValidatedJson;
use crate::services::{AuthSession, NewAccount};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8))]
    pub password: String, // SecretBox不要（Deserialize後すぐハッシュ化）
    #[garde(length(min = 1, max = 100))]
    pub first_name: String,
    #[garde(length(min = 1, max = 100))]
    pub last_name: String,
}

/// 登録・ログイン共通レスポンス
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            user: session.user.into(),
        }
    }
}

/// ユーザー登録ハンドラー
///
/// POST /auth/register
///
/// # Security
/// - パスワードはログに出力しない
/// - パスワードは即座にハッシュ化
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let session = state
        .auth_service
        .register(NewAccount {
            email: request.email,
            password: request.password,
            first_name: request.first_name,
            last_name: request.last_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session.into())))
}
