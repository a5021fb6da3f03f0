pub mod call_log;
pub mod config;
pub mod error;
pub mod prompt_loader;
pub mod relay;
pub mod routes;

pub use config::Config;
pub use routes::{router, AppState};
