use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use domain_storage::exception::FileException;

use super::dtos::ErrorResponse;

/// Maps upload failures onto HTTP responses.
///
/// Server side failures are answered with a fixed message, store details stay in the logs.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub FileException);

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            FileException::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            FileException::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            FileException::EmptyFile | FileException::LengthMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            FileException::UploadFailed { .. } | FileException::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            "Upload failed.".to_string()
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(message))
    }
}
