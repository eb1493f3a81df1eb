use actix_web::{get, put, web, HttpRequest};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::presence::registry::{PresenceRegistry, PresenceSnapshot, PresenceStatus},
    utils::ValidatedJson,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SetStatusRequest {
    pub status: PresenceStatus,
}

/// Explicit status override (away/offline/online do user chọn)
#[put("/status")]
pub async fn set_status(
    presence: web::Data<PresenceRegistry>,
    body: ValidatedJson<SetStatusRequest>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    presence.set_status(&user_id, body.0.status).await?;

    Ok(success::Success::ok(None).message("Status updated"))
}

#[get("/{user_id}")]
pub async fn get_presence(
    presence: web::Data<PresenceRegistry>,
    user_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<PresenceSnapshot>, error::Error> {
    get_claims(&req)?;

    let snapshot = presence.snapshot(&user_id).await?;

    Ok(success::Success::ok(Some(snapshot)).message("Successfully retrieved presence"))
}
