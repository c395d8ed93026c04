use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::errors::PetSegError;

/// HTTP face of `PetSegError`.
#[derive(Debug)]
pub struct ApiError(pub PetSegError);

impl From<PetSegError> for ApiError {
    fn from(err: PetSegError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            PetSegError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PetSegError::InvalidImage { .. } => StatusCode::BAD_REQUEST,
            PetSegError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PetSegError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PetSegError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PetSegError::UnknownClassIndex { .. }
            | PetSegError::DimensionMismatch { .. }
            | PetSegError::Configuration { .. }
            | PetSegError::Model { .. }
            | PetSegError::FileSystem { .. }
            | PetSegError::Encoding { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        } else {
            tracing::warn!(error = %self.0, "request rejected");
        }
        (
            status,
            Json(json!({ "error": self.0.to_string(), "kind": self.0.kind() })),
        )
            .into_response()
    }
}
