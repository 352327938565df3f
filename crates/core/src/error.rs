use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid duration '{0}'")]
    Duration(String),
}
