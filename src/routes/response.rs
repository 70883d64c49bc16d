use actix_web::error::{BlockingError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::helper::catalog_helpers::CatalogError;

/// Uniform JSON body: `{success, data}` on success, `{success, message}` on
/// failure.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl Envelope<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::ok(data))
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid '{field}': {message}")]
    BadRequest { field: String, message: String },
    #[error("Duplicate value for '{field}'")]
    Conflict { field: String },
    #[error("{0}")]
    NotImplemented(String),
    #[error("{0}")]
    Internal(String),
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(what) => ApiError::NotFound(what),
            CatalogError::Validation { field, message } => ApiError::BadRequest { field, message },
            CatalogError::ConstraintViolation { field } => ApiError::Conflict { field },
            CatalogError::Store(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl From<BlockingError> for ApiError {
    fn from(e: BlockingError) -> Self {
        ApiError::Internal(format!("Blocking task failed: {}", e))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Internal(detail) => {
                log::error!("Request failed: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(Envelope::<()>::failure(message))
    }
}

/// Keeps query decoding failures inside the envelope.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest {
        field: "query".to_string(),
        message: err.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::StoreError;
    use actix_web::body::to_bytes;

    async fn body_of(err: ApiError) -> serde_json::Value {
        let bytes = to_bytes(err.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn store_failures_do_not_leak_details() {
        let err: ApiError = CatalogError::Store(StoreError::Invalid("disk on fire".to_string())).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(err).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
    }

    #[actix_web::test]
    async fn lost_blocking_pool_is_an_internal_error() {
        let blocking_err = actix_web::web::block(|| -> () { panic!("blocking task lost") })
            .await
            .unwrap_err();
        let err: ApiError = blocking_err.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(err).await["message"], "Internal server error");
    }

    #[actix_web::test]
    async fn catalog_errors_map_to_client_statuses() {
        let not_found: ApiError = CatalogError::NotFound("Course".to_string()).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(not_found).await["message"], "Course not found");

        let invalid: ApiError = CatalogError::validation("priceMax", "'x' is not a number").into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let duplicate: ApiError = CatalogError::ConstraintViolation {
            field: "email".to_string(),
        }
        .into();
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(body_of(duplicate).await["message"], "Duplicate value for 'email'");
    }
}
