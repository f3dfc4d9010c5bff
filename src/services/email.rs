use std::sync::{Arc, Mutex};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("メール構築エラー: {0}")]
    Build(String),

    #[error("メール送信エラー: {0}")]
    Send(String),
}

/// メール送信ポート
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// パスワードリセットメールの件名
pub const PASSWORD_RESET_SUBJECT: &str = "パスワードリセットのリクエスト";

/// パスワードリセットメールの本文を生成
pub fn password_reset_email_body(reset_url: &str) -> String {
    format!(
        "パスワードリセットのリクエストを受け付けました。\n\n\
         以下のURLをクリックしてパスワードをリセットしてください：\n\
         {reset_url}\n\n\
         このリンクは24時間有効です。\n\
         心当たりがない場合は、このメールを無視してください。"
    )
}

/// メール送信サービス（開発環境: ログ出力のみ）
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        tracing::info!(to = %to, subject = %subject, "メール送信（開発モード）");
        tracing::debug!(body = %body, "メール本文");
        Ok(())
    }
}

/// 送信済みメール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// 送信内容をメモリに記録するメーラー（テスト用）
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の送信を失敗させる
    pub fn fail_sends(&self, fail: bool) {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = fail;
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let fail = self.fail.lock().map(|f| *f).unwrap_or(false);
        if fail {
            return Err(MailError::Send("recording mailer configured to fail".to_string()));
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|_| MailError::Send("mailbox poisoned".to_string()))?;
        sent.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(feature = "email")]
pub use smtp::SmtpMailer;

#[cfg(feature = "email")]
mod smtp {
    use async_trait::async_trait;
    use lettre::message::header::ContentType;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    use super::{MailError, Mailer};

    /// SMTP（STARTTLS）経由のメール送信
    #[derive(Clone)]
    pub struct SmtpMailer {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: String,
    }

    impl SmtpMailer {
        pub fn new(
            host: &str,
            port: u16,
            username: String,
            password: String,
            from: String,
        ) -> Result<Self, MailError> {
            let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MailError::Build(e.to_string()))?
                .port(port)
                .credentials(Credentials::new(username, password))
                .build();

            Ok(Self { transport, from })
        }
    }

    #[async_trait]
    impl Mailer for SmtpMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
            let message = Message::builder()
                .from(
                    self.from
                        .parse()
                        .map_err(|e| MailError::Build(format!("{e}")))?,
                )
                .to(to.parse().map_err(|e| MailError::Build(format!("{e}")))?)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string())
                .map_err(|e| MailError::Build(e.to_string()))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| MailError::Send(e.to_string()))?;

            tracing::info!(to = %to, "メール送信完了");
            Ok(())
        }
    }
}
