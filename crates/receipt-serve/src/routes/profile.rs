//! Profile proxy endpoint.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use receipt_core::Provider;
use serde::Deserialize;

use super::{lookup_headers, respond};
use crate::client_id::ClientId;
use crate::error::ApiError;
use crate::proxy;
use crate::state::AppState;

/// Query parameters accepted by lookup endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupQuery {
    /// `1` or `true` skips the cache read. The fetched result is still stored.
    #[serde(default)]
    pub nocache: Option<String>,
}

impl LookupQuery {
    pub fn bypass(&self) -> bool {
        matches!(self.nocache.as_deref(), Some("1" | "true"))
    }
}

/// `GET /api/{provider}/users/{username}`
///
/// Returns the normalized profile document, from cache when fresh.
pub async fn get_profile(
    State(state): State<AppState>,
    Path((provider, username)): Path<(String, String)>,
    Query(query): Query<LookupQuery>,
    client: ClientId,
) -> Response {
    let result = async {
        let provider: Provider = provider.parse()?;
        let lookup =
            proxy::lookup_profile(&state, provider, &username, &client, query.bypass()).await?;
        Ok::<_, ApiError>((lookup_headers(&lookup), Json(lookup.document)).into_response())
    }
    .await;

    respond(&state, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nocache_flag_values() {
        let q = |v: Option<&str>| LookupQuery {
            nocache: v.map(str::to_string),
        };
        assert!(q(Some("1")).bypass());
        assert!(q(Some("true")).bypass());
        assert!(!q(Some("0")).bypass());
        assert!(!q(None).bypass());
    }
}
