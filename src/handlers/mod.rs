pub mod health;
pub mod login;
pub mod password_reset;
pub mod register;
pub mod users;

pub use health::health_check;
pub use login::login;
pub use password_reset::{request_password_reset, reset_password};
pub use register::register;
pub use users::{get_me, get_user, update_me};
