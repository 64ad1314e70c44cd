//! Extractors whose rejections use the API error body.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// JSON body; malformed or mistyped payloads are `VALIDATION_ERROR`
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string; unparseable parameters are `VALIDATION_ERROR`
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| ApiError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Numeric `{id}` path segment. Anything that is not an id cannot name a
/// resource, so it is `NOT_FOUND`.
#[derive(Debug, Clone, Copy)]
pub struct Id(pub i64);

impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::not_found(e.body_text()))?;
        raw.parse::<i64>()
            .map(Id)
            .map_err(|_| ApiError::not_found(format!("No resource with id '{}'", raw)))
    }
}

/// Two numeric path segments, such as `/boards/{id}/keywords/{keyword_id}`
#[derive(Debug, Clone, Copy)]
pub struct IdPair(pub i64, pub i64);

impl<S> FromRequestParts<S> for IdPair
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((first, second)) = Path::<(String, String)>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::not_found(e.body_text()))?;
        match (first.parse::<i64>(), second.parse::<i64>()) {
            (Ok(a), Ok(b)) => Ok(IdPair(a, b)),
            _ => Err(ApiError::not_found(format!(
                "No resource with id '{}/{}'",
                first, second
            ))),
        }
    }
}
