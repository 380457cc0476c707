//! Plan catalog handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use wallet_billing_core::{BillingError, NewPlan, NewPlanFeature, Plan, PlanFeature, PlanId};

use super::parse_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Create a plan. Plans set what a subscription credits, so this is a
/// service call.
pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<NewPlan>,
) -> Result<Json<Plan>, ApiError> {
    body.validate()?;
    let plan = state.store.create_plan(&body).await?;

    tracing::info!(
        service = %auth.service_name,
        plan_id = %plan.plan_id,
        plan_amount = plan.plan_amount,
        price = plan.price,
        duration_in_days = plan.duration_in_days,
        "Plan created"
    );
    Ok(Json(plan))
}

/// Plan list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListPlansQuery {
    /// Only return plans that can be subscribed to (default: false).
    #[serde(default)]
    pub active_only: bool,
}

/// List plans response.
#[derive(Debug, Serialize)]
pub struct ListPlansResponse {
    /// Plans.
    pub plans: Vec<Plan>,
}

/// List plans.
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPlansQuery>,
) -> Result<Json<ListPlansResponse>, ApiError> {
    let plans = state.store.list_plans(query.active_only).await?;
    Ok(Json(ListPlansResponse { plans }))
}

/// Get a plan.
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let plan_id: PlanId = parse_id(&plan_id)?;
    let plan = find_plan(&state, plan_id).await?;
    Ok(Json(plan))
}

/// Add a feature to a plan.
pub async fn create_feature(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
    Json(body): Json<NewPlanFeature>,
) -> Result<Json<PlanFeature>, ApiError> {
    let plan_id: PlanId = parse_id(&plan_id)?;
    body.validate()?;
    let feature = state.store.create_plan_feature(plan_id, &body).await?;

    tracing::info!(
        plan_id = %plan_id,
        feature_id = %feature.feature_id,
        "Plan feature created"
    );
    Ok(Json(feature))
}

/// List features response.
#[derive(Debug, Serialize)]
pub struct ListFeaturesResponse {
    /// Features of the plan.
    pub features: Vec<PlanFeature>,
}

/// List a plan's features.
pub async fn list_features(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
) -> Result<Json<ListFeaturesResponse>, ApiError> {
    let plan_id: PlanId = parse_id(&plan_id)?;
    find_plan(&state, plan_id).await?;
    let features = state.store.list_plan_features(plan_id).await?;
    Ok(Json(ListFeaturesResponse { features }))
}

pub(crate) async fn find_plan(state: &AppState, plan_id: PlanId) -> Result<Plan, ApiError> {
    state
        .store
        .get_plan(plan_id)
        .await?
        .ok_or_else(|| BillingError::not_found("plan", plan_id).into())
}
