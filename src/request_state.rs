use aide::OperationInput;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{
    database::{AppState, DatabaseConnection},
    error::ServiceError,
};

/// Custom extractor that hands each handler its own connection from the
/// pool.
pub struct RequestState {
    pub db: DatabaseConnection,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestState
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let db = state.connection().await?;

        Ok(Self { db })
    }
}

impl OperationInput for RequestState {}
