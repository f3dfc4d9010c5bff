use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::repositories::{ResetTokenError, ResetTokenStore};

/// トークン長（バイト）
const TOKEN_BYTES: usize = 32;

/// 単回使用・期限付きのパスワードリセットトークン
///
/// 同一ユーザーに対する複数の有効トークンを許容する（それぞれ1回のみ使用可能）
#[derive(Clone)]
pub struct ResetTokenService {
    store: Arc<dyn ResetTokenStore>,
    ttl: Duration,
}

impl ResetTokenService {
    pub fn new(store: Arc<dyn ResetTokenStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// トークンを発行し、平文トークンを返す
    ///
    /// # Security
    /// - 平文トークンは保存しない（SHA256ハッシュのみ保存）
    pub async fn create(&self, user_id: Uuid) -> Result<String, ResetTokenError> {
        self.create_at(user_id, OffsetDateTime::now_utc()).await
    }

    pub async fn create_at(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<String, ResetTokenError> {
        let token = generate_token();
        self.store
            .put(&hash_token(&token), user_id, now + self.ttl)
            .await?;
        Ok(token)
    }

    /// トークンを消費し、所有ユーザーIDを返す
    pub async fn redeem(&self, token: &str) -> Result<Uuid, ResetTokenError> {
        self.redeem_at(token, OffsetDateTime::now_utc()).await
    }

    pub async fn redeem_at(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Uuid, ResetTokenError> {
        self.store.take_if_valid(&hash_token(token), now).await
    }
}

/// 32バイトのランダムトークンを生成
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// トークンをSHA256でハッシュ化
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
