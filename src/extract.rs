// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request extractors that reject with the API's JSON error body.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

use crate::error::AppError;

/// JSON request body.
///
/// Same as [`axum::Json`], but a body that is not valid JSON for `T` (missing
/// field, unknown enum value, wrong content type) is a 400
/// [`AppError::BadRequest`] instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                tracing::debug!(
                    status = rejection.status().as_u16(),
                    reason = %rejection.body_text(),
                    "Request body rejected"
                );
                Err(AppError::BadRequest("Invalid request".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Greeting {
        name: String,
    }

    fn request(content_type: &str, body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let ApiJson(body) =
            ApiJson::<Greeting>::from_request(request("application/json", r#"{"name":"a"}"#), &())
                .await
                .unwrap();
        assert_eq!(body.name, "a");
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let err = ApiJson::<Greeting>::from_request(request("application/json", "{}"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Invalid request"));
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_bad_request() {
        let err = ApiJson::<Greeting>::from_request(request("text/plain", r#"{"name":"a"}"#), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
