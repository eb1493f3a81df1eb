use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::repository::ConversationRepository;
use crate::modules::conversation::repository_pg::ConversationRepositoryPg;
use crate::modules::conversation::schema::ConversationEntity;
use crate::modules::membership::source::{ConversationLookup, MembershipSource};

#[async_trait::async_trait]
impl ConversationLookup for ConversationRepositoryPg {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        ConversationRepository::find_by_id(self, conversation_id).await
    }
}

/// Nguồn 1: participants list. Authoritative cho direct chat;
/// với group chat chỉ còn vai trò legacy residue (grants_access).
#[derive(Clone)]
pub struct ParticipantSourcePg {
    pool: sqlx::PgPool,
}

impl ParticipantSourcePg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MembershipSource for ParticipantSourcePg {
    fn name(&self) -> &'static str {
        "participants"
    }

    async fn active_members(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<Vec<Uuid>, error::SystemError> {
        // participants list không phải authoritative membership cho group
        if conversation.is_group {
            return Ok(vec![]);
        }

        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM participants WHERE conversation_id = $1")
                .bind(conversation.id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn grants_access(
        &self,
        conversation: &ConversationEntity,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM participants WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation.id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}

/// Nguồn 2: GroupMembership rows với is_active = true
#[derive(Clone)]
pub struct GroupMembershipSourcePg {
    pool: sqlx::PgPool,
}

impl GroupMembershipSourcePg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MembershipSource for GroupMembershipSourcePg {
    fn name(&self) -> &'static str {
        "group_memberships"
    }

    async fn active_members(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<Vec<Uuid>, error::SystemError> {
        if !conversation.is_group {
            return Ok(vec![]);
        }

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM group_memberships WHERE conversation_id = $1 AND is_active = true",
        )
        .bind(conversation.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn grants_access(
        &self,
        conversation: &ConversationEntity,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        if !conversation.is_group {
            return Ok(false);
        }

        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM group_memberships WHERE conversation_id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(conversation.id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}

/// Nguồn 3: DefaultGroupMembership - membership của default group
/// (Kindergarten, 1st Grade...) mà conversation của nó trỏ tới conversation này
#[derive(Clone)]
pub struct DefaultGroupMembershipSourcePg {
    pool: sqlx::PgPool,
}

impl DefaultGroupMembershipSourcePg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MembershipSource for DefaultGroupMembershipSourcePg {
    fn name(&self) -> &'static str {
        "default_group_memberships"
    }

    async fn active_members(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<Vec<Uuid>, error::SystemError> {
        if !conversation.is_group {
            return Ok(vec![]);
        }

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT dgm.user_id FROM default_group_memberships dgm
            JOIN default_groups dg ON dg.id = dgm.default_group_id
            WHERE dg.conversation_id = $1 AND dgm.is_active = true
            "#,
        )
        .bind(conversation.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn grants_access(
        &self,
        conversation: &ConversationEntity,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        if !conversation.is_group {
            return Ok(false);
        }

        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM default_group_memberships dgm
            JOIN default_groups dg ON dg.id = dgm.default_group_id
            WHERE dg.conversation_id = $1 AND dgm.user_id = $2 AND dgm.is_active = true
            "#,
        )
        .bind(conversation.id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}
