// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{BrokerSubmission, PaymentRecord, ServiceId};
use crate::routes::{validated, JsonBody};
use crate::services::ledger::entitlement_view;
use crate::services::payments::MAX_RECEIPT_BYTES;
use crate::services::{Entitlement, NewPayment, Receipt};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum_extra::extract::WithRejection;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Re-evaluate a live entitlement view at least this often, so expiries
/// show up without a write.
const STREAM_REFRESH: Duration = Duration::from_secs(60);

/// Payment bodies carry the receipt as base64, plus the other fields.
const PAYMENT_BODY_LIMIT: usize = MAX_RECEIPT_BYTES.div_ceil(3) * 4 + 64 * 1024;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/entitlements", get(get_entitlements))
        .route("/api/entitlements/stream", get(stream_entitlements))
        .route("/api/entitlements/{service_id}", get(get_entitlement))
        .route("/api/codes/redeem", post(redeem_code))
        .route(
            "/api/verification",
            get(list_my_submissions).post(submit_verification),
        )
        .route(
            "/api/payments",
            get(list_my_payments)
                .post(submit_payment)
                .layer(DefaultBodyLimit::max(PAYMENT_BODY_LIMIT)),
        )
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: Option<String>,
    pub entitlements: Vec<Entitlement>,
}

/// Get the current user, creating the profile on first sign-in.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .ledger
        .ensure_user(&user.user_id, user.email.as_deref())
        .await?;

    Ok(Json(UserResponse {
        user_id: user.user_id,
        email: profile.email.or(user.email),
        is_admin: user.is_admin,
        created_at: profile.created_at.map(format_utc_rfc3339),
        entitlements: entitlement_view(&profile.subscriptions, Utc::now()),
    }))
}

// ─── Entitlements ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EntitlementsResponse {
    pub as_of: String,
    pub entitlements: Vec<Entitlement>,
}

async fn get_entitlements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EntitlementsResponse>> {
    let now = Utc::now();
    let entitlements = state.ledger.entitlements(&user.user_id, now).await?;
    Ok(Json(EntitlementsResponse {
        as_of: format_utc_rfc3339(now),
        entitlements,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EntitlementCheckResponse {
    pub service_id: ServiceId,
    pub entitled: bool,
}

/// Gate check for one service.
async fn get_entitlement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(service_id): Path<String>,
) -> Result<Json<EntitlementCheckResponse>> {
    let service: ServiceId = service_id
        .parse()
        .map_err(|e: crate::models::catalog::UnknownService| AppError::Validation(e.to_string()))?;
    let entitled = state
        .ledger
        .is_entitled(&user.user_id, service, Utc::now())
        .await?;
    Ok(Json(EntitlementCheckResponse {
        service_id: service,
        entitled,
    }))
}

/// Server-sent events carrying the user's entitlement view.
///
/// One event is sent on connect, then one per grant and one per refresh
/// interval.
async fn stream_entitlements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let watch = state.ledger.watch(&user.user_id).await?;

    let events = stream::unfold((watch, true), |(mut watch, first)| async move {
        if !first {
            // A closed channel ends the stream; a refresh timeout just re-sends.
            if let Ok(Err(_)) = tokio::time::timeout(STREAM_REFRESH, watch.changed()).await {
                return None;
            }
        }

        let subscriptions = match watch.current() {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                tracing::error!(error = %e, "Entitlement watch unavailable");
                return None;
            }
        };
        let view = entitlement_view(&subscriptions, Utc::now());
        let event = Event::default()
            .event("entitlements")
            .json_data(&view)
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to encode entitlement event");
                Event::default().comment("encode failed")
            });
        Some((Ok(event), (watch, false)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// ─── Access Codes ────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RedeemRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedeemResponse {
    pub success: bool,
    pub service_id: ServiceId,
    pub title: String,
}

async fn redeem_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(body), _): JsonBody<RedeemRequest>,
) -> Result<Json<RedeemResponse>> {
    let body = validated(body)?;
    let service = state
        .access_codes
        .redeem(&user.user_id, user.email.as_deref(), &body.code)
        .await?;

    Ok(Json(RedeemResponse {
        success: true,
        service_id: service,
        title: service.title().to_string(),
    }))
}

// ─── Broker Verification ─────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct VerificationRequest {
    #[validate(length(min = 1, max = 100))]
    pub broker_name: String,
    #[validate(length(min = 1, max = 64))]
    pub account_number: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreatedResponse {
    pub success: bool,
    pub id: String,
}

async fn submit_verification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(body), _): JsonBody<VerificationRequest>,
) -> Result<Json<CreatedResponse>> {
    let body = validated(body)?;
    let submission = state
        .verification
        .submit(
            &user.user_id,
            user.email.as_deref(),
            &body.broker_name,
            &body.account_number,
        )
        .await?;

    Ok(Json(CreatedResponse {
        success: true,
        id: submission.id,
    }))
}

#[derive(Serialize)]
pub struct SubmissionsResponse {
    pub submissions: Vec<BrokerSubmission>,
}

async fn list_my_submissions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SubmissionsResponse>> {
    let submissions = state.verification.list_for_user(&user.user_id).await?;
    Ok(Json(SubmissionsResponse { submissions }))
}

// ─── Payments ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct ReceiptUpload {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1, max = 100))]
    pub content_type: String,
    /// Standard base64 file contents
    pub data: String,
}

#[derive(Deserialize, Validate)]
pub struct PaymentRequest {
    pub service_id: ServiceId,
    pub price_amount: f64,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: String,
    #[validate(length(max = 100))]
    pub sender_name: Option<String>,
    #[validate(nested)]
    pub receipt: Option<ReceiptUpload>,
}

async fn submit_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(body), _): JsonBody<PaymentRequest>,
) -> Result<Json<CreatedResponse>> {
    let body = validated(body)?;

    let receipt = body
        .receipt
        .map(|upload| -> Result<Receipt> {
            let data = STANDARD
                .decode(upload.data.as_bytes())
                .map_err(|_| AppError::Validation("Receipt is not valid base64".to_string()))?;
            Ok(Receipt {
                file_name: upload.file_name,
                content_type: upload.content_type,
                data,
            })
        })
        .transpose()?;

    let record = state
        .payments
        .submit(
            &user.user_id,
            user.email.as_deref(),
            NewPayment {
                service: body.service_id,
                price_amount: body.price_amount,
                payment_method: body.payment_method,
                sender_name: body.sender_name,
                receipt,
            },
        )
        .await?;

    Ok(Json(CreatedResponse {
        success: true,
        id: record.id,
    }))
}

#[derive(Serialize)]
pub struct PaymentsResponse {
    pub payments: Vec<PaymentRecord>,
}

async fn list_my_payments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PaymentsResponse>> {
    let payments = state.payments.list_for_user(&user.user_id).await?;
    Ok(Json(PaymentsResponse { payments }))
}
