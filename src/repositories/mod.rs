pub mod memory;
pub mod password_reset_token;
pub mod user;

pub use memory::{MemoryResetTokenStore, MemoryUserStore};
pub use password_reset_token::{PasswordResetTokenRepository, ResetTokenError, ResetTokenStore};
pub use user::{UserRepository, UserStore, UserStoreError};
