use thiserror::Error;

pub type EnckitResult<T> = Result<T, EnckitError>;

#[derive(Debug, Error)]
pub enum EnckitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
