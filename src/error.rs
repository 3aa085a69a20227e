use crate::http::{IntoResponse, Json, Response, StatusCode};

/// The error taxonomy of the controller layer.
///
/// Every variant maps to one HTTP status and renders as a JSON body with a
/// single `detail` field. Server-side variants (`Configuration`, `Internal`)
/// keep their real detail out of the response body; it is only logged.
pub enum ApiError {
    /// No auth callback accepted the request (401).
    AuthenticationFailed { detail: String },
    /// A permission rule rejected the request or object (403).
    PermissionDenied { detail: String },
    /// Object lookup failed (404).
    NotFound { detail: String },
    /// CSRF token missing or mismatched (403).
    Csrf { detail: String },
    /// Argument extraction or coercion failed (422).
    Validation { detail: String },
    /// Malformed request (400).
    BadRequest { detail: String },
    /// A controller was used before being registered, or registered twice (500).
    Configuration { detail: String },
    /// Unexpected failure inside the handler or the pipeline (500).
    Internal { detail: String },
    /// Arbitrary status with a custom detail message.
    Custom { status: StatusCode, detail: String },
}

impl ApiError {
    pub fn authentication_failed() -> Self {
        ApiError::AuthenticationFailed {
            detail: "Unauthorized".to_string(),
        }
    }

    /// 403 with the denying rule's message, or the default detail.
    pub fn permission_denied(message: Option<String>) -> Self {
        ApiError::PermissionDenied {
            detail: message.unwrap_or_else(|| "Permission denied".to_string()),
        }
    }

    pub fn not_found(message: Option<String>) -> Self {
        ApiError::NotFound {
            detail: message.unwrap_or_else(|| "Not found".to_string()),
        }
    }

    pub fn csrf() -> Self {
        ApiError::Csrf {
            detail: "CSRF check failed".to_string(),
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        ApiError::Validation {
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest {
            detail: detail.into(),
        }
    }

    pub fn configuration(detail: impl Into<String>) -> Self {
        ApiError::Configuration {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal {
            detail: detail.into(),
        }
    }

    pub fn custom(status: StatusCode, detail: impl Into<String>) -> Self {
        ApiError::Custom {
            status,
            detail: detail.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied { .. } | ApiError::Csrf { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Configuration { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Custom { status, .. } => *status,
        }
    }

    /// The full detail message, including server-side internals.
    pub fn detail(&self) -> &str {
        match self {
            ApiError::AuthenticationFailed { detail }
            | ApiError::PermissionDenied { detail }
            | ApiError::NotFound { detail }
            | ApiError::Csrf { detail }
            | ApiError::Validation { detail }
            | ApiError::BadRequest { detail }
            | ApiError::Configuration { detail }
            | ApiError::Internal { detail }
            | ApiError::Custom { detail, .. } => detail,
        }
    }

    /// The detail safe to put in a response body. 500-class errors render as
    /// a generic message; the real detail goes to the error log.
    pub fn public_detail(&self) -> &str {
        match self {
            ApiError::Configuration { .. } | ApiError::Internal { .. } => "Internal server error",
            other => other.detail(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.public_detail() });
        (self.status_code(), Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::AuthenticationFailed { detail } => write!(f, "Unauthorized: {detail}"),
            ApiError::PermissionDenied { detail } => write!(f, "Permission Denied: {detail}"),
            ApiError::NotFound { detail } => write!(f, "Not Found: {detail}"),
            ApiError::Csrf { detail } => write!(f, "CSRF Failure: {detail}"),
            ApiError::Validation { detail } => write!(f, "Validation Error: {detail}"),
            ApiError::BadRequest { detail } => write!(f, "Bad Request: {detail}"),
            ApiError::Configuration { detail } => write!(f, "Configuration Error: {detail}"),
            ApiError::Internal { detail } => write!(f, "Internal Error: {detail}"),
            ApiError::Custom { status, detail } => write!(f, "Error ({status}): {detail}"),
        }
    }
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for ApiError {}
