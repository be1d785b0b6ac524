//! Rendered receipt endpoints.
//!
//! Same lookup flow as the JSON endpoint (cache, quota, headers); the
//! document is laid out as a receipt and rendered server-side.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use receipt_core::{Profile, Provider, Receipt};

use super::{lookup_headers, respond};
use super::profile::LookupQuery;
use crate::client_id::ClientId;
use crate::error::ApiError;
use crate::proxy::{self, Lookup};
use crate::render;
use crate::state::AppState;

/// Receipts carry the issue time, so clients may only hold them briefly.
const RECEIPT_CACHE_CONTROL: &str = "private, max-age=60";

async fn build_receipt(
    state: &AppState,
    provider: &str,
    username: &str,
    query: &LookupQuery,
    client: &ClientId,
) -> Result<(Lookup, Receipt), ApiError> {
    let provider: Provider = provider.parse()?;
    let lookup = proxy::lookup_profile(state, provider, username, client, query.bypass()).await?;
    let profile = Profile::from_document(provider, &lookup.document)?;
    let receipt = Receipt::from_profile(&profile, state.cache.now());
    Ok((lookup, receipt))
}

fn image_response(lookup: &Lookup, content_type: &'static str, body: Vec<u8>) -> Response {
    let mut headers = lookup_headers(lookup);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(RECEIPT_CACHE_CONTROL),
    );
    (headers, body).into_response()
}

/// `GET /api/{provider}/users/{username}/receipt.svg`
pub async fn receipt_svg(
    State(state): State<AppState>,
    Path((provider, username)): Path<(String, String)>,
    Query(query): Query<LookupQuery>,
    client: ClientId,
) -> Response {
    let result = async {
        let (lookup, receipt) =
            build_receipt(&state, &provider, &username, &query, &client).await?;
        let svg = render::render_svg(&receipt);
        Ok::<_, ApiError>(image_response(&lookup, "image/svg+xml", svg.into_bytes()))
    }
    .await;

    respond(&state, result)
}

/// `GET /api/{provider}/users/{username}/receipt.png`
pub async fn receipt_png(
    State(state): State<AppState>,
    Path((provider, username)): Path<(String, String)>,
    Query(query): Query<LookupQuery>,
    client: ClientId,
) -> Response {
    let result = async {
        let (lookup, receipt) =
            build_receipt(&state, &provider, &username, &query, &client).await?;

        let png = tokio::task::spawn_blocking(move || render::render_png(&receipt))
            .await
            .map_err(|e| ApiError::Internal(e.into()))??;

        Ok::<_, ApiError>(image_response(&lookup, "image/png", png))
    }
    .await;

    respond(&state, result)
}
