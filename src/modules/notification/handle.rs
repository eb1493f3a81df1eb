use actix_web::{get, put, web, HttpRequest};

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::notification::{
        model::UpdateSettingsRequest,
        repository::SettingsRepository,
        repository_pg::SettingsRepositoryPg,
        schema::NotificationSettingsEntity,
    },
    utils::ValidatedJson,
};

#[get("/settings")]
pub async fn get_settings(
    settings_repo: web::Data<SettingsRepositoryPg>,
    req: HttpRequest,
) -> Result<success::Success<NotificationSettingsEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let settings = settings_repo.get_or_create(&user_id).await?;

    Ok(success::Success::ok(Some(settings)).message("Successfully retrieved settings"))
}

#[put("/settings")]
pub async fn update_settings(
    settings_repo: web::Data<SettingsRepositoryPg>,
    body: ValidatedJson<UpdateSettingsRequest>,
    req: HttpRequest,
) -> Result<success::Success<NotificationSettingsEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let current = settings_repo.get_or_create(&user_id).await?;
    let updated = settings_repo.update(&body.0.apply(current)).await?;

    Ok(success::Success::ok(Some(updated)).message("Settings updated"))
}
