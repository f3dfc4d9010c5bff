use std::sync::LazyLock;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AppError;

/// ユーザー不在時の検証に使うハッシュ（初回使用時に生成）
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("dummy-password-for-timing").ok());

/// パスワードをargon2idでハッシュ化
///
/// ソルトはハッシュごとにランダム生成され、PHC文字列に埋め込まれる
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// パスワードを検証
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
///
/// これにより、ユーザーの存在有無を応答時間から推測できなくなる
pub fn verify_dummy_password(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}
