use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing configuration: no key '{key}' in {source_name}")]
    MissingConfig { source_name: String, key: String },

    #[error("histogram error: {0}")]
    Histogram(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

impl Error {
    pub(crate) fn missing(source_name: impl Into<String>, key: impl ToString) -> Self {
        Error::MissingConfig {
            source_name: source_name.into(),
            key: key.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
