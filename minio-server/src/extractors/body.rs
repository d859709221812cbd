use std::convert::Infallible;
use std::io;

use axum::body::Body;
use axum::extract::{FromRequest, Request};
use futures_util::{StreamExt, TryStreamExt};
use minio_service::PayloadStream;

/// An extractor that turns the request body into a [`PayloadStream`].
pub struct PayloadBody(pub PayloadStream);

impl std::fmt::Debug for PayloadBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadBody").finish()
    }
}

impl<S> FromRequest<S> for PayloadBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(request: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let stream = request
            .into_body()
            .into_data_stream()
            .map_err(io::Error::other)
            .boxed();

        Ok(Self(stream))
    }
}
