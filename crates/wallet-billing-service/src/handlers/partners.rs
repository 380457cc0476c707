//! Partner handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use wallet_billing_core::{BillingError, NewPartner, Partner, PartnerId};

use super::{parse_id, split_page, PageQuery};
use crate::error::ApiError;
use crate::state::AppState;

/// List partners response.
#[derive(Debug, Serialize)]
pub struct ListPartnersResponse {
    /// Partners in creation order.
    pub partners: Vec<Partner>,
    /// Whether there are more partners.
    pub has_more: bool,
}

/// Register a partner.
pub async fn create_partner(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewPartner>,
) -> Result<Json<Partner>, ApiError> {
    body.validate()?;
    let partner = state.store.create_partner(&body).await?;

    tracing::info!(partner_id = %partner.partner_id, "Partner created");
    Ok(Json(partner))
}

/// Get a partner.
pub async fn get_partner(
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<String>,
) -> Result<Json<Partner>, ApiError> {
    let partner_id: PartnerId = parse_id(&partner_id)?;
    let partner = state
        .store
        .get_partner(partner_id)
        .await?
        .ok_or_else(|| BillingError::not_found("partner", partner_id))?;
    Ok(Json(partner))
}

/// List partners.
pub async fn list_partners(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListPartnersResponse>, ApiError> {
    let limit = query.limit();
    let rows = state.store.list_partners(limit + 1, query.offset).await?;
    let (partners, has_more) = split_page(rows, limit);

    Ok(Json(ListPartnersResponse { partners, has_more }))
}
