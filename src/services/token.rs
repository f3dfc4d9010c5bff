use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;

const EXPECTED_ALGORITHM: Algorithm = Algorithm::HS256;
const EXPECTED_ALGORITHM_NAME: &str = "HS256";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,
}

/// セッションクレーム（JWT ペイロード）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// ユーザーID
    pub sub: Uuid,
    /// 発行時刻（UNIX秒）
    pub iat: i64,
    /// 有効期限（UNIX秒）
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
}

/// セッショントークン（HS256 JWT）の発行・検証
///
/// 署名鍵は起動時に一度だけ構築する。シークレットを変更すると
/// 発行済みトークンはすべて無効になる。
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: Uuid) -> Result<IssuedToken, AppError> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, subject: Uuid, now: OffsetDateTime) -> Result<IssuedToken, AppError> {
        let claims = SessionClaims {
            sub: subject,
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };

        let token = encode(&Header::new(EXPECTED_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!(error = ?e, "トークン生成エラー");
                AppError::Internal(anyhow::anyhow!("token encode error"))
            })?;

        Ok(IssuedToken { token, claims })
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// トークンを検証
    ///
    /// 1. 形式（3セグメント、ヘッダーに alg）: `Malformed`
    /// 2. alg が HS256 であり署名が一致すること: `InvalidSignature`
    /// 3. `exp > now`: `Expired`
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<SessionClaims, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(TokenError::Malformed);
        }

        // アルゴリズム差し替え攻撃対策（"none" や非対称アルゴリズムを拒否）
        if header_algorithm(segments[0])? != EXPECTED_ALGORITHM_NAME {
            return Err(TokenError::InvalidSignature);
        }

        // 有効期限は jsonwebtoken の leeway を使わずここで判定する
        let mut validation = Validation::new(EXPECTED_ALGORITHM);
        validation.validate_exp = false;

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                _ => TokenError::Malformed,
            })?;

        if claims.exp <= now.unix_timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// JWT ヘッダーセグメントから alg を取り出す
fn header_algorithm(segment: &str) -> Result<String, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    let header: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)?;

    header
        .get("alg")
        .and_then(|alg| alg.as_str())
        .map(str::to_string)
        .ok_or(TokenError::Malformed)
}
