use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::model::ConversationSummary;
use crate::modules::conversation::repository::{ConversationRepository, MembershipRepository};
use crate::modules::conversation::schema::{
    ConversationEntity, GroupMembershipEntity, MemberRole,
};

#[derive(Clone)]
pub struct ConversationRepositoryPg {
    pool: sqlx::PgPool,
}

impl ConversationRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for ConversationRepositoryPg {
    async fn find_by_id(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        let conversation =
            sqlx::query_as::<_, ConversationEntity>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(conversation)
    }

    async fn find_direct_between(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<Option<ConversationEntity>, error::SystemError> {
        let conversation = sqlx::query_as::<_, ConversationEntity>(
            r#"
            SELECT c.* FROM conversations c
            JOIN participants pa ON pa.conversation_id = c.id AND pa.user_id = $1
            JOIN participants pb ON pb.conversation_id = c.id AND pb.user_id = $2
            WHERE c.is_group = false
            LIMIT 1
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn create_direct(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<ConversationEntity, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        let conversation = sqlx::query_as::<_, ConversationEntity>(
            "INSERT INTO conversations (id, is_group, created_by) VALUES ($1, false, $2) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(user_a)
        .fetch_one(tx.as_mut())
        .await?;

        for user_id in [user_a, user_b] {
            sqlx::query("INSERT INTO participants (conversation_id, user_id) VALUES ($1, $2)")
                .bind(conversation.id)
                .bind(user_id)
                .execute(tx.as_mut())
                .await?;
        }

        tx.commit().await?;

        Ok(conversation)
    }

    async fn create_group(
        &self,
        name: &str,
        creator: &Uuid,
        member_ids: &[Uuid],
    ) -> Result<ConversationEntity, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        let conversation = sqlx::query_as::<_, ConversationEntity>(
            "INSERT INTO conversations (id, name, is_group, created_by) VALUES ($1, $2, true, $3) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(creator)
        .fetch_one(tx.as_mut())
        .await?;

        // creator là admin, các member còn lại role member; dedup qua unique index
        let mut seen = std::collections::HashSet::new();
        seen.insert(*creator);
        let mut members: Vec<(Uuid, MemberRole)> = vec![(*creator, MemberRole::Admin)];
        for id in member_ids {
            if seen.insert(*id) {
                members.push((*id, MemberRole::Member));
            }
        }

        for (user_id, role) in &members {
            sqlx::query(
                r#"
                INSERT INTO group_memberships (id, conversation_id, user_id, role, is_active, added_by)
                VALUES ($1, $2, $3, $4, true, $5)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(conversation.id)
            .bind(user_id)
            .bind(role)
            .bind(creator)
            .execute(tx.as_mut())
            .await?;

            // đồng bộ participants list (backward compatibility)
            sqlx::query(
                "INSERT INTO participants (conversation_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(conversation.id)
            .bind(user_id)
            .execute(tx.as_mut())
            .await?;
        }

        tx.commit().await?;

        Ok(conversation)
    }

    async fn list_for_user(
        &self,
        user_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<ConversationSummary>, error::SystemError> {
        // Union 3 membership sources, giống resolver nhưng ở chiều
        // "conversation nào chứa user" thay vì "user nào trong conversation"
        let rows = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT
                c.id,
                c.name,
                c.is_group,
                c.created_at,
                m.content AS last_content,
                m.sender_id AS last_sender_id,
                m.created_at AS last_created_at
            FROM conversations c
            LEFT JOIN LATERAL (
                SELECT content, sender_id, created_at
                FROM messages
                WHERE conversation_id = c.id
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            ) m ON true
            WHERE c.id IN (
                SELECT conversation_id FROM participants WHERE user_id = $1
                UNION
                SELECT conversation_id FROM group_memberships
                WHERE user_id = $1 AND is_active = true
                UNION
                SELECT dg.conversation_id FROM default_group_memberships dgm
                JOIN default_groups dg ON dg.id = dgm.default_group_id
                WHERE dgm.user_id = $1 AND dgm.is_active = true AND dg.conversation_id IS NOT NULL
            )
            ORDER BY c.updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn rename(
        &self,
        conversation_id: &Uuid,
        name: &str,
    ) -> Result<(), error::SystemError> {
        sqlx::query("UPDATE conversations SET name = $2, updated_at = now() WHERE id = $1")
            .bind(conversation_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_updated_at(&self, conversation_id: &Uuid) -> Result<(), error::SystemError> {
        sqlx::query("UPDATE conversations SET updated_at = now() WHERE id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct MembershipRepositoryPg {
    pool: sqlx::PgPool,
}

impl MembershipRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MembershipRepository for MembershipRepositoryPg {
    async fn find_active(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<GroupMembershipEntity>, error::SystemError> {
        let membership = sqlx::query_as::<_, GroupMembershipEntity>(
            "SELECT * FROM group_memberships WHERE conversation_id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(membership)
    }

    async fn upsert_active(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        role: MemberRole,
        added_by: Option<&Uuid>,
    ) -> Result<GroupMembershipEntity, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        // reactivate row cũ nếu user từng ở trong nhóm (unique theo conversation+user)
        let membership = sqlx::query_as::<_, GroupMembershipEntity>(
            r#"
            INSERT INTO group_memberships (id, conversation_id, user_id, role, is_active, added_by)
            VALUES ($1, $2, $3, $4, true, $5)
            ON CONFLICT (conversation_id, user_id) DO UPDATE
            SET is_active = true, joined_at = now(), left_at = NULL, added_by = $5
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(conversation_id)
        .bind(user_id)
        .bind(&role)
        .bind(added_by)
        .fetch_one(tx.as_mut())
        .await?;

        sqlx::query(
            "INSERT INTO participants (conversation_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(membership)
    }

    async fn deactivate(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        let group_closed = sqlx::query(
            r#"
            UPDATE group_memberships SET is_active = false, left_at = now()
            WHERE conversation_id = $1 AND user_id = $2 AND is_active = true
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(tx.as_mut())
        .await?
        .rows_affected();

        let default_closed = sqlx::query(
            r#"
            UPDATE default_group_memberships dgm SET is_active = false, left_at = now()
            FROM default_groups dg
            WHERE dg.id = dgm.default_group_id
              AND dg.conversation_id = $1
              AND dgm.user_id = $2
              AND dgm.is_active = true
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(tx.as_mut())
        .await?
        .rows_affected();

        // luôn gỡ khỏi participants list - legacy residue không được giữ quyền truy cập
        let participant_removed = sqlx::query(
            "DELETE FROM participants WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(tx.as_mut())
        .await?
        .rows_affected();

        tx.commit().await?;

        Ok(group_closed + default_closed + participant_removed > 0)
    }

    async fn set_role(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        role: MemberRole,
    ) -> Result<bool, error::SystemError> {
        let rows = sqlx::query(
            "UPDATE group_memberships SET role = $3 WHERE conversation_id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(&role)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }
}
