use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type ConfigError = Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Malformed upstream payload: {0}")]
    MalformedUpstreamPayload(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs can carry the market data API key as a query parameter.
        let err = err.without_url();
        if err.is_timeout() {
            Error::UpstreamUnavailable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Error::MalformedUpstreamPayload(err.to_string())
        } else {
            Error::UpstreamUnavailable(err.to_string())
        }
    }
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::ConfigMissing(_) => "CONFIG_MISSING",
            Error::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Error::MalformedUpstreamPayload(_) => "MALFORMED_UPSTREAM_PAYLOAD",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Config(_) => "CONFIG",
            Error::Storage(_) => "STORAGE",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::Invalid(_) => "INVALID",
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody<'a> {
    message: String,
    code: &'a str,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Invalid(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            message: self.to_string(),
            code: self.error_code(),
        })
    }
}
