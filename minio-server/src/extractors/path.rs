use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use minio_service::{ObjectPath, ServiceError};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extractors::Xt;

/// Raw path parameters of object endpoints, before validation.
#[derive(Debug, Deserialize)]
struct ObjectParams {
    bucket: String,
    key: String,
}

impl<S> FromRequestParts<S> for Xt<ObjectPath>
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<ObjectParams>::from_request_parts(parts, state).await?;
        let path = ObjectPath::new(params.bucket, params.key).map_err(ServiceError::from)?;

        sentry::configure_scope(|s| {
            s.set_tag("bucket", &path.bucket);
            s.set_extra("key", path.key.clone().into());
        });

        Ok(Xt(path))
    }
}
