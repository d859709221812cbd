use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use minio_service::ObjectPath;
use serde::Serialize;

use crate::error::ApiResult;
use crate::extractors::{PayloadBody, Xt};
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    let object_routes = routing::get(object_get)
        .head(object_head)
        .put(object_put)
        .delete(object_delete);

    Router::new().route("/{bucket}/{*key}", object_routes)
}

/// Response returned when storing an object.
#[derive(Debug, Serialize)]
pub struct PutObjectResponse {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

async fn object_get(
    State(state): State<ServiceState>,
    Xt(path): Xt<ObjectPath>,
) -> ApiResult<Response> {
    let Some((info, stream)) = state.service.get_object(&path).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let headers = [(header::CONTENT_LENGTH, info.size)];
    Ok((headers, Body::from_stream(stream)).into_response())
}

async fn object_head(
    State(state): State<ServiceState>,
    Xt(path): Xt<ObjectPath>,
) -> ApiResult<Response> {
    let Some((info, _stream)) = state.service.get_object(&path).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    Ok([(header::CONTENT_LENGTH, info.size)].into_response())
}

async fn object_put(
    State(state): State<ServiceState>,
    Xt(path): Xt<ObjectPath>,
    PayloadBody(body): PayloadBody,
) -> ApiResult<Response> {
    let info = state.service.put_object(&path, body).await?;

    let ObjectPath { bucket, key } = path;
    let response = Json(PutObjectResponse {
        bucket,
        key,
        size: info.size,
    });

    Ok((StatusCode::OK, response).into_response())
}

async fn object_delete(
    State(state): State<ServiceState>,
    Xt(path): Xt<ObjectPath>,
) -> ApiResult<impl IntoResponse> {
    state.service.delete_object(&path).await?;
    Ok(StatusCode::NO_CONTENT)
}
