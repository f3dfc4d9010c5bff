pub mod auth;
pub mod email;
pub mod password;
pub mod password_reset;
pub mod reset_token;
pub mod token;

pub use auth::{AuthService, AuthSession, NewAccount};
pub use email::{LogMailer, Mailer, RecordingMailer};
pub use password_reset::PasswordResetService;
pub use reset_token::ResetTokenService;
pub use token::{SessionClaims, TokenError, TokenService};
