mod assets;
pub mod auth;
mod health;
mod home;

pub use assets::ui_css;
pub use auth::{login, login_form, logout, user_menu};
pub use health::{HealthResponse, health_check, readiness_check};
pub use home::home;
