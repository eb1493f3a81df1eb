use actix_web::{delete, get, post, put, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        conversation::{
            model::{
                AddMemberRequest, ConversationSummary, CreateDirectRequest, CreateGroupRequest,
                RenameGroupRequest,
            },
            repository_pg::{ConversationRepositoryPg, MembershipRepositoryPg},
            schema::ConversationEntity,
            service::ConversationService,
        },
        message::repository_pg::MessageRepositoryPg,
        notification::repository_pg::{NotificationRepositoryPg, SettingsRepositoryPg},
        presence::registry::PresenceRegistry,
    },
    utils::ValidatedJson,
};

pub type ConversationSvc = ConversationService<
    ConversationRepositoryPg,
    MembershipRepositoryPg,
    MessageRepositoryPg,
    NotificationRepositoryPg,
    SettingsRepositoryPg,
    PresenceRegistry,
>;

#[get("/")]
pub async fn get_conversations(
    conversation_svc: web::Data<ConversationSvc>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ConversationSummary>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversations = conversation_svc.list_for_user(user_id).await?;

    Ok(success::Success::ok(Some(conversations)).message("Successfully retrieved conversations"))
}

#[post("/direct")]
pub async fn create_direct(
    conversation_svc: web::Data<ConversationSvc>,
    body: ValidatedJson<CreateDirectRequest>,
    req: HttpRequest,
) -> Result<success::Success<ConversationEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversation =
        conversation_svc.get_or_create_direct(user_id, body.0.recipient_id).await?;

    Ok(success::Success::ok(Some(conversation)).message("Conversation ready"))
}

#[post("/groups")]
pub async fn create_group(
    conversation_svc: web::Data<ConversationSvc>,
    body: ValidatedJson<CreateGroupRequest>,
    req: HttpRequest,
) -> Result<success::Success<ConversationEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversation =
        conversation_svc.create_group(user_id, &body.0.name, &body.0.member_ids).await?;

    Ok(success::Success::created(Some(conversation)).message("Successfully created group"))
}

#[post("/groups/{conversation_id}/members")]
pub async fn add_member(
    conversation_svc: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    body: ValidatedJson<AddMemberRequest>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    conversation_svc.add_member(user_id, *conversation_id, body.0.user_id).await?;

    Ok(success::Success::ok(None).message("Member added"))
}

#[delete("/groups/{conversation_id}/members/{user_id}")]
pub async fn remove_member(
    conversation_svc: web::Data<ConversationSvc>,
    path: web::Path<(Uuid, Uuid)>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let actor = get_claims(&req)?.sub;
    let (conversation_id, user_id) = path.into_inner();

    conversation_svc.remove_member(actor, conversation_id, user_id).await?;

    Ok(success::Success::ok(None).message("Member removed"))
}

#[post("/groups/{conversation_id}/leave")]
pub async fn leave_group(
    conversation_svc: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    conversation_svc.leave_group(user_id, *conversation_id).await?;

    Ok(success::Success::ok(None).message("Left the group"))
}

#[put("/groups/{conversation_id}/members/{user_id}/admin")]
pub async fn promote_to_admin(
    conversation_svc: web::Data<ConversationSvc>,
    path: web::Path<(Uuid, Uuid)>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let actor = get_claims(&req)?.sub;
    let (conversation_id, user_id) = path.into_inner();

    conversation_svc.promote_to_admin(actor, conversation_id, user_id).await?;

    Ok(success::Success::ok(None).message("Member promoted to admin"))
}

#[put("/groups/{conversation_id}/name")]
pub async fn rename_group(
    conversation_svc: web::Data<ConversationSvc>,
    conversation_id: web::Path<Uuid>,
    body: ValidatedJson<RenameGroupRequest>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    conversation_svc.rename_group(user_id, *conversation_id, &body.0.name).await?;

    Ok(success::Success::ok(None).message("Group renamed"))
}
