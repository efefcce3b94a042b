pub mod accounts;
pub mod app;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod state;
pub mod storage;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::load_data;
