//! インメモリ実装（テスト・ローカル検証用）

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{NewUser, PasswordResetToken, ProfileUpdate, User};
use crate::repositories::{ResetTokenError, ResetTokenStore, UserStore, UserStoreError};

#[derive(Default, Clone)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, UserStoreError> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        // 重複チェックと挿入を同一の書き込みロック内で行う
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(UserStoreError::DuplicateEmail);
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            status: user.status,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), UserStoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or(UserStoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<User, UserStoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or(UserStoreError::NotFound)?;
        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }
}

#[derive(Default, Clone)]
pub struct MemoryResetTokenStore {
    tokens: Arc<Mutex<HashMap<String, PasswordResetToken>>>,
}

impl MemoryResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存中のトークン数
    pub async fn len(&self) -> usize {
        self.tokens.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.lock().await.is_empty()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    async fn put(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<(), ResetTokenError> {
        let token = PasswordResetToken {
            token_hash: token_hash.to_string(),
            user_id,
            expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tokens
            .lock()
            .await
            .insert(token_hash.to_string(), token);
        Ok(())
    }

    async fn take_if_valid(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Uuid, ResetTokenError> {
        let token = self
            .tokens
            .lock()
            .await
            .remove(token_hash)
            .ok_or(ResetTokenError::NotFound)?;

        if token.is_expired_at(now) {
            return Err(ResetTokenError::Expired);
        }

        Ok(token.user_id)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::models::UserStatus;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            status: UserStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.insert(new_user("alice@example.com")).await.unwrap();

        let result = store.insert(new_user("alice@example.com")).await;
        assert!(matches!(result, Err(UserStoreError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_keep_single_user() {
        let store = MemoryUserStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(new_user("race@example.com")).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_update_profile_keeps_unset_fields() {
        let store = MemoryUserStore::new();
        let user = store.insert(new_user("alice@example.com")).await.unwrap();

        let updated = store
            .update_profile(
                user.id,
                ProfileUpdate {
                    first_name: None,
                    last_name: Some("Jones".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Alice");
        assert_eq!(updated.last_name, "Jones");
    }

    #[tokio::test]
    async fn test_update_password_hash_unknown_user() {
        let store = MemoryUserStore::new();
        let result = store.update_password_hash(Uuid::new_v4(), "hash").await;
        assert!(matches!(result, Err(UserStoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_take_if_valid_removes_token() {
        let store = MemoryResetTokenStore::new();
        let user_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        store
            .put("hash", user_id, now + Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(store.take_if_valid("hash", now).await.unwrap(), user_id);
        assert!(matches!(
            store.take_if_valid("hash", now).await,
            Err(ResetTokenError::NotFound)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_take_if_valid_purges_expired_token() {
        let store = MemoryResetTokenStore::new();
        let now = OffsetDateTime::now_utc();
        store
            .put("hash", Uuid::new_v4(), now + Duration::hours(24))
            .await
            .unwrap();

        let later = now + Duration::hours(24);
        assert!(matches!(
            store.take_if_valid("hash", later).await,
            Err(ResetTokenError::Expired)
        ));
        assert!(store.is_empty().await);
    }
}
