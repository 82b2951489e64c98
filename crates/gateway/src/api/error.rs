//! Mapping of domain errors onto HTTP responses.
//!
//! Every error body has the shape `{ "detail": "<message>" }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use tl_domain::error::Error;

/// An error ready to be returned from a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    /// Like the `From<Error>` mapping, but server-side failures carry the
    /// error's own message instead of a generic one.
    pub fn exposed(e: Error) -> Self {
        let mut api = Self::from_domain(&e);
        if api.status == StatusCode::INTERNAL_SERVER_ERROR {
            api.detail = e.to_string();
        }
        api
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn from_domain(e: &Error) -> Self {
        if e.is_client_error() {
            return Self::bad_request(e.to_string());
        }
        match e {
            Error::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                detail: "thread not found".into(),
            },
            other => {
                tracing::error!(error = %other, "request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: "internal server error".into(),
                }
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::from_domain(&e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_are_bad_request() {
        assert_eq!(
            ApiError::from(Error::MissingCredential).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::InvalidIdentity).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        let e = ApiError::from(Error::NotFound("GET /threads/x/messages".into()));
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn server_errors_hide_detail_unless_exposed() {
        let hidden = ApiError::from(Error::StoreUnavailable("db password wrong".into()));
        assert_eq!(hidden.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!hidden.detail.contains("password"));

        let shown = ApiError::exposed(Error::ExternalService("run failed".into()));
        assert_eq!(shown.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(shown.detail.contains("run failed"));
    }
}
