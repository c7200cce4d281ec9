pub mod catalog;
pub mod communication;
pub mod configuration;
pub mod core;
pub mod creation;
pub mod database;
pub mod identity;
pub mod profile;
pub mod render;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config Error:{0}")]
    ConfigError(String),

    #[error("Server error:{0}")]
    ServerError(String),
}
