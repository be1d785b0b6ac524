//! Personalized trends endpoint.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use receipt_core::Provider;

use super::{lookup_headers, respond};
use crate::error::ApiError;
use crate::proxy;
use crate::state::AppState;

/// `GET /api/{provider}/trends/personalized`
///
/// Returns `{ "data": [Trend] }`, cached for the trends TTL. Only X offers
/// trends. Not counted against the receipt quota.
pub async fn personalized(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Response {
    let result = async {
        let provider: Provider = provider.parse()?;
        if provider != Provider::X {
            return Err(ApiError::BadRequest(format!(
                "trends are not available for {provider}"
            )));
        }

        let lookup = proxy::lookup_trends(&state).await?;
        Ok::<_, ApiError>((lookup_headers(&lookup), Json(lookup.document)).into_response())
    }
    .await;

    respond(&state, result)
}
