//! Service account administration handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use super::auth::AppState;
use crate::web::dto::{
    ApiResponse, CreateServiceAccountRequest, FormOrJson, ServiceAccountResponse,
};
use crate::web::error::ApiError;

/// GET /api/service-accounts - List service accounts.
pub async fn list_service_accounts(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<ServiceAccountResponse>>> {
    let accounts = state
        .service_accounts
        .list()
        .into_iter()
        .map(ServiceAccountResponse::from)
        .collect();
    Json(ApiResponse::new(accounts))
}

/// POST /api/service-accounts - Create a service account.
pub async fn create_service_account(
    State(state): State<AppState>,
    FormOrJson(req): FormOrJson<CreateServiceAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceAccountResponse>>), ApiError> {
    let name = req.name.trim();

    let account = match (req.password.as_deref(), req.password_hash.as_deref()) {
        (Some(password), None) => state.service_accounts.create(name, password)?,
        (None, Some(hash)) => state.service_accounts.create_with_hash(None, name, hash)?,
        _ => {
            return Err(ApiError::bad_request(
                "Exactly one of password and password_hash is required",
            ))
        }
    };

    info!(name = %account.name, user_id = %account.id, "Service account created via API");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(account.into())),
    ))
}

/// DELETE /api/service-accounts/:name - Delete a service account.
pub async fn delete_service_account(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.service_accounts.delete_by_name(&name)? {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::not_found("Service account not found")),
    }
}
