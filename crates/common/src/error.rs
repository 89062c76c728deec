use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("market data error: {0}")]
    MarketData(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid parameter: {0}")]
    Parameter(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
