use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
};
use modkit_host::{Identity, Problem};

use crate::domain::{Service, Surface};

use super::dto::{GuestQuery, MessageDto, ResetRequest, ResetResponse};
use super::error::domain_error_to_problem;
use super::routes::{COOKIES_PATH, GUEST_COOKIES_PATH};

pub async fn get_cookie_guest(
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<GuestQuery>,
) -> Result<Json<MessageDto>, Problem> {
    let message = svc
        .consume(&query.name, Surface::Rest)
        .await
        .map_err(|e| domain_error_to_problem(&e, GUEST_COOKIES_PATH))?;
    Ok(Json(MessageDto { message }))
}

/// Dispense to the authenticated caller, known by the local part of their email.
pub async fn get_cookie(
    Identity(caller): Identity,
    Extension(svc): Extension<Arc<Service>>,
) -> Result<Json<MessageDto>, Problem> {
    let message = svc
        .consume(caller.local_part(), Surface::Rest)
        .await
        .map_err(|e| domain_error_to_problem(&e, COOKIES_PATH))?;
    Ok(Json(MessageDto { message }))
}

/// Reset the quota. A missing body or a body without `cookies_left` restores the default.
pub async fn reset_cookies(
    Extension(svc): Extension<Arc<Service>>,
    body: Option<Json<ResetRequest>>,
) -> Json<ResetResponse> {
    let Json(req) = body.unwrap_or_default();
    Json(svc.reset(req.cookies_left, Surface::Rest).into())
}
