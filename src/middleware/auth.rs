use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::{SessionClaims, TokenError};
use crate::state::AppState;

/// 認証済みユーザー
///
/// `Authorization: Bearer <token>` を検証し、ハンドラーにユーザーIDを渡す。
/// ヘッダー不在・形式不正・トークン無効はすべて 401。
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub claims: SessionClaims,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AppError::MissingBearerToken)?
            .to_str()
            .map_err(|_| TokenError::Malformed)?;

        let token = bearer_token(header)?;
        let claims = state.token_service.validate(token)?;

        Ok(Self {
            user_id: claims.sub,
            claims,
        })
    }
}

/// "Bearer <token>" 形式からトークンを取り出す
fn bearer_token(header: &str) -> Result<&str, TokenError> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(TokenError::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::Request;
    use time::Duration;

    use crate::repositories::{MemoryResetTokenStore, MemoryUserStore};
    use crate::services::{RecordingMailer, TokenService};
    use crate::state::StateSettings;

    fn state() -> AppState {
        AppState::from_parts(
            std::sync::Arc::new(MemoryUserStore::default()),
            std::sync::Arc::new(MemoryResetTokenStore::default()),
            std::sync::Arc::new(RecordingMailer::default()),
            TokenService::new(b"test-secret", Duration::hours(24)),
            StateSettings {
                reset_url_base: "http://localhost/reset".to_string(),
                password_reset_token_ttl: Duration::hours(24),
            },
        )
    }

    async fn extract(authorization: Option<&str>) -> Result<AuthUser, AppError> {
        let mut builder = Request::builder().uri("/api/users/me");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, &state()).await
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected_before_validation() {
        let result = extract(None).await;
        assert!(matches!(result, Err(AppError::MissingBearerToken)));
    }

    #[tokio::test]
    async fn test_non_bearer_header_is_malformed() {
        let result = extract(Some("Basic abc")).await;
        assert!(matches!(
            result,
            Err(AppError::Unauthorized(TokenError::Malformed))
        ));
    }

    #[tokio::test]
    async fn test_valid_bearer_token_yields_user() {
        let state = state();
        let user_id = Uuid::new_v4();
        let issued = state.token_service.issue(user_id).unwrap();

        let (mut parts, ()) = Request::builder()
            .header(AUTHORIZATION, format!("Bearer {}", issued.token))
            .body(())
            .unwrap()
            .into_parts();
        let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(auth.user_id, user_id);
    }

    #[test]
    fn test_bearer_token_extracts_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes() {
        assert_eq!(bearer_token("Basic abc"), Err(TokenError::Malformed));
        assert_eq!(bearer_token("abc.def.ghi"), Err(TokenError::Malformed));
        assert_eq!(bearer_token("Bearer"), Err(TokenError::Malformed));
        assert_eq!(bearer_token("Bearer "), Err(TokenError::Malformed));
        assert_eq!(bearer_token("Bearer a b"), Err(TokenError::Malformed));
    }
}
