use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewUser, ProfileUpdate, User};

/// users テーブルのメールアドレス UNIQUE 制約名
pub const USERS_EMAIL_KEY: &str = "users_email_key";

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("email already exists")]
    DuplicateEmail,

    #[error("user not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// ユーザー永続化ポート
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, UserStoreError>;

    /// 新しいユーザーを作成
    ///
    /// メールアドレスの一意性はストア側で保証すること
    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError>;

    /// パスワードハッシュを丸ごと置き換える
    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), UserStoreError>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<User, UserStoreError>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    /// メールアドレスでユーザーを検索
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, status, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// ユーザーIDでユーザーを検索
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, UserStoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, status, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// # Errors
    /// - UNIQUE制約違反時: `UserStoreError::DuplicateEmail`
    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, password_hash, first_name, last_name, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.constraint() == Some(USERS_EMAIL_KEY)
            {
                return UserStoreError::DuplicateEmail;
            }
            UserStoreError::Database(e)
        })
    }

    /// # Note
    /// password_hash はログに出力しないこと
    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), UserStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::NotFound);
        }

        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<User, UserStoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, first_name, last_name, status, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(update.first_name)
        .bind(update.last_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(UserStoreError::NotFound)
    }
}
