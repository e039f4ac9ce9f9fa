//! `POST /manager/add_many`.

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::data;
use crate::domain::events::EventSink;
use crate::state::AppState;
use crate::web::auth::ApiKeyAuth;
use crate::web::error::{db_error, ApiError, OptionNotFoundExt};
use crate::web::json::ok_with_events;

#[derive(Debug, Deserialize)]
pub struct AddManyInput {
    pub ids: Vec<i64>,
    pub organization: i64,
}

/// `POST /manager/add_many` `{ids, organization}`: `find_or_create` each
/// manager and attach it to the organization.
pub async fn add_many(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Json(input): Json<AddManyInput>,
) -> Result<Response, ApiError> {
    let organization = data::organizations::find_by_external(&state.db_pool, &auth.app, input.organization)
        .await
        .map_err(|e| db_error("find organization", e))?
        .or_not_found(format!("organization {}", input.organization))?;

    for external_id in &input.ids {
        let manager = data::managers::find_or_create(&state.db_pool, &auth.app, *external_id)
            .await
            .map_err(ApiError::from)?;
        data::organizations::add_manager(&state.db_pool, organization.id, manager.id)
            .await
            .map_err(|e| db_error("attach manager to organization", e))?;
    }

    Ok(ok_with_events(
        serde_json::json!({"ids": input.ids}),
        EventSink::new(),
    ))
}
