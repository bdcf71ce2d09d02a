//! Error and Result module

use actix_web::ResponseError;
use derive_more::{Display, From};

/// Errors which occur while configuring rewrite rules or applying a
/// rewrite result to a request/response pair
#[derive(Debug, Display, From, derive_more::Error)]
#[non_exhaustive]
pub enum Error {
    #[display("Internal Io Error")]
    IoError(std::io::Error),

    #[display("Invalid rewrite expression")]
    ParseError(ht_rewrite::ParseError),

    #[display("Invalid rule construction")]
    RuleError(ht_rewrite::RuleError),

    #[display("Rewrite generated an invalid uri")]
    InvalidUri(actix_http::uri::InvalidUri),

    #[display("Rewrite returned invalid status code")]
    InvalidStatus(actix_http::error::InvalidStatusCode),

    #[display("Rewrite produced an invalid header value")]
    InvalidHeader(actix_http::header::InvalidHeaderValue),
}

impl ResponseError for Error {
    /// Returns `500 Internal Server Error`.
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
    }
}
