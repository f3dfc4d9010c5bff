use secrecy::SecretBox;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{name} must be between 1 and {max} seconds (got {value})")]
    InvalidTtl {
        name: &'static str,
        value: i64,
        max: i64,
    },
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // セッショントークン設定
    /// JWT署名用シークレット（HS256）
    pub jwt_secret: SecretBox<String>,
    #[serde(default = "default_session_token_ttl_secs")]
    pub session_token_ttl_secs: i64,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_from_address: Option<String>,

    // パスワードリセット設定
    #[serde(default = "default_password_reset_url_base")]
    pub password_reset_url_base: String,
    #[serde(default = "default_password_reset_token_ttl_secs")]
    pub password_reset_token_ttl_secs: i64,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SESSION_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
/// トークン有効期限の上限（365日）
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;
const DEFAULT_PASSWORD_RESET_URL_BASE: &str = "http://localhost:3000/reset-password";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_session_token_ttl_secs() -> i64 {
    DEFAULT_SESSION_TOKEN_TTL_SECS
}

fn default_password_reset_url_base() -> String {
    DEFAULT_PASSWORD_RESET_URL_BASE.to_string()
}

fn default_password_reset_token_ttl_secs() -> i64 {
    DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        envy::from_env::<Self>()?.validated()
    }

    /// 環境変数以外（テスト等）から設定を読み込む
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Self>(vars)?.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        check_ttl("SESSION_TOKEN_TTL_SECS", self.session_token_ttl_secs)?;
        check_ttl(
            "PASSWORD_RESET_TOKEN_TTL_SECS",
            self.password_reset_token_ttl_secs,
        )?;
        Ok(self)
    }
}

// 0以下は発行時点で期限切れ、巨大な値は有効期限の計算でオーバーフローする
fn check_ttl(name: &'static str, value: i64) -> Result<(), ConfigError> {
    if (1..=MAX_TOKEN_TTL_SECS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTtl {
            name,
            value,
            max: MAX_TOKEN_TTL_SECS,
        })
    }
}
