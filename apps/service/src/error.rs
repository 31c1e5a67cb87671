use std::io::Error as IoError;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use netpulse::QueryError;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Query(QueryError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Query(QueryError::TooManySegments { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Missing keys answer `null`; nothing internal leaks into the body.
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Query(QueryError::NotFound(_)) => Value::Null,
            AppError::Query(e @ QueryError::TooManySegments { .. }) => json!({ "error": e.to_string() }),
            _ => json!({ "error": "internal error" }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
