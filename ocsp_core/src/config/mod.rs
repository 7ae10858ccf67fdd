pub mod settings;

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    MissingParameter(String),
    InvalidArgument(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingParameter(name) => write!(f, "missing parameter: {name}"),
            ConfigError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
