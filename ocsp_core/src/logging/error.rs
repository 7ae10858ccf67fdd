#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("Failed to initialize logging: {0}")]
    InitError(String),
    #[error("Invalid log filter directive: {0}")]
    InvalidFilter(String),
}
