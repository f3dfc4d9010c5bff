use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// アカウント状態
///
/// Postgres の `user_status` 列挙型に対応（NULL は許容しない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// ログイン可能な状態かどうか
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// 新規ユーザー作成パラメータ
///
/// `password_hash` はハッシュ化済みの値のみを受け付ける
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub status: UserStatus,
}

/// プロフィール更新パラメータ（None の項目は現在値を維持）
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(status: UserStatus) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_only_active_is_active() {
        assert!(user(UserStatus::Active).is_active());
        assert!(!user(UserStatus::Inactive).is_active());
        assert!(!user(UserStatus::Suspended).is_active());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(UserStatus::Active)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["status"], "active");
    }
}
