use axum::{
    Json,
    extract::{Path, State},
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{AuthUser, ValidatedJson};
use crate::models::{ProfileUpdate, User, UserStatus};
use crate::state::AppState;

/// ユーザー情報レスポンス（パスワードハッシュは含めない）
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            status: user.status,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[garde(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[garde(length(min = 1, max = 100))]
    pub last_name: Option<String>,
}

/// GET /api/users/me
pub async fn get_me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .user_store
        .find_by_id(auth.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(user.into()))
}

/// PUT /api/users/me
///
/// 指定されなかった項目は現在の値を維持する
pub async fn update_me(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .user_store
        .update_profile(
            auth.user_id,
            ProfileUpdate {
                first_name: request.first_name,
                last_name: request.last_name,
            },
        )
        .await?;

    tracing::info!(user_id = %user.id, "プロフィール更新");

    Ok(Json(user.into()))
}

/// GET /api/users/{id}
pub async fn get_user(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .user_store
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_is_rejected() {
        let request = UpdateProfileRequest {
            first_name: Some("".to_string()),
            last_name: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_partial_update_is_valid() {
        let request = UpdateProfileRequest {
            first_name: None,
            last_name: Some("Jones".to_string()),
        };
        assert!(request.validate().is_ok());
    }
}
