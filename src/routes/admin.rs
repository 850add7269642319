// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: code issuance, review queues and manual grants.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{
    AccessCode, BrokerSubmission, PaymentRecord, PaymentStatus, ServiceId, SubmissionStatus,
};
use crate::routes::{validated, JsonBody, QueryParams, StatusFilter, SuccessResponse};
use crate::services::CodeRequest;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum_extra::extract::WithRejection;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const DEFAULT_CODE_LIST_LIMIT: u32 = 100;
const MAX_CODE_LIST_LIMIT: u32 = 500;

/// Admin routes. `require_auth` and `require_admin` are applied in
/// routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/codes", get(list_codes).post(generate_code))
        .route("/admin/verification", get(list_submissions))
        .route("/admin/verification/{id}", put(review_submission))
        .route("/admin/payments", get(list_payments))
        .route("/admin/payments/{id}", put(update_payment))
        .route("/admin/users/{uid}/subscriptions", post(grant_subscription))
}

// ─── Access Codes ────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct GenerateCodeRequest {
    pub service_id: ServiceId,
    #[validate(range(min = 1))]
    pub duration_days: u32,
    /// Redemption window, the configured default if omitted
    #[validate(range(min = 1))]
    pub valid_for_days: Option<u32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GenerateCodeResponse {
    pub success: bool,
    pub code: String,
    pub service_id: ServiceId,
    pub duration_days: u32,
    pub expires_at: String,
}

async fn generate_code(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    WithRejection(Json(body), _): JsonBody<GenerateCodeRequest>,
) -> Result<Json<GenerateCodeResponse>> {
    let body = validated(body)?;
    let code = state
        .access_codes
        .generate(CodeRequest {
            service: body.service_id,
            duration_days: body.duration_days,
            valid_for_days: body.valid_for_days,
            created_by: Some(admin.user_id),
        })
        .await?;

    Ok(Json(GenerateCodeResponse {
        success: true,
        code: code.code,
        service_id: code.service_id,
        duration_days: code.duration_days,
        expires_at: format_utc_rfc3339(code.expires_at),
    }))
}

#[derive(Deserialize)]
struct CodeListQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct CodeListResponse {
    pub codes: Vec<AccessCode>,
}

async fn list_codes(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryParams<CodeListQuery>,
) -> Result<Json<CodeListResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_CODE_LIST_LIMIT)
        .clamp(1, MAX_CODE_LIST_LIMIT);
    let codes = state.access_codes.list(limit).await?;
    Ok(Json(CodeListResponse { codes }))
}

// ─── Broker Verification ─────────────────────────────────────

#[derive(Serialize)]
pub struct SubmissionListResponse {
    pub submissions: Vec<BrokerSubmission>,
}

async fn list_submissions(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(filter), _): QueryParams<StatusFilter<SubmissionStatus>>,
) -> Result<Json<SubmissionListResponse>> {
    let submissions = state.verification.list(filter.status).await?;
    Ok(Json(SubmissionListResponse { submissions }))
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub status: SubmissionStatus,
}

async fn review_submission(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    WithRejection(Json(body), _): JsonBody<ReviewRequest>,
) -> Result<Json<SuccessResponse>> {
    tracing::debug!(admin = %admin.user_id, submission_id = %id, "Admin review");
    state.verification.review(&id, body.status).await?;
    Ok(SuccessResponse::ok())
}

// ─── Payments ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentRecord>,
}

async fn list_payments(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(filter), _): QueryParams<StatusFilter<PaymentStatus>>,
) -> Result<Json<PaymentListResponse>> {
    let payments = state.payments.list(filter.status).await?;
    Ok(Json(PaymentListResponse { payments }))
}

#[derive(Deserialize)]
pub struct PaymentStatusRequest {
    pub status: PaymentStatus,
}

async fn update_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    WithRejection(Json(body), _): JsonBody<PaymentStatusRequest>,
) -> Result<Json<SuccessResponse>> {
    state.payments.set_status(&id, body.status).await?;
    Ok(SuccessResponse::ok())
}

// ─── Manual Grants ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct GrantRequest {
    pub service_id: ServiceId,
    #[validate(range(min = 1))]
    pub duration_days: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GrantResponse {
    pub success: bool,
    pub service_id: ServiceId,
    pub expires_at: String,
}

async fn grant_subscription(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(uid): Path<String>,
    WithRejection(Json(body), _): JsonBody<GrantRequest>,
) -> Result<Json<GrantResponse>> {
    let body = validated(body)?;
    let subscription = state
        .ledger
        .grant(&uid, body.service_id, body.duration_days)
        .await?;

    tracing::info!(
        admin = %admin.user_id,
        user_id = %uid,
        service = %body.service_id,
        "Manual subscription grant"
    );

    Ok(Json(GrantResponse {
        success: true,
        service_id: body.service_id,
        expires_at: format_utc_rfc3339(subscription.expires_at),
    }))
}
