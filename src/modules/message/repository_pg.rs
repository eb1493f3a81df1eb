use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{model::NewMessage, repository::MessageRepository, schema::MessageEntity},
};

#[derive(Clone)]
pub struct MessageRepositoryPg {
    pool: sqlx::PgPool,
}

impl MessageRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for MessageRepositoryPg {
    async fn create(&self, message: &NewMessage) -> Result<MessageEntity, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, reply_to_id, type, content, file_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.reply_to_id)
        .bind(&message._type)
        .bind(&message.content)
        .bind(&message.file_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message =
            sqlx::query_as::<_, MessageEntity>("SELECT * FROM messages WHERE id = $1")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(message)
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        // has index on (conversation_id, created_at, id)
        let messages = sqlx::query_as::<_, MessageEntity>(
            "SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC, id ASC LIMIT $2",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_read(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        // idempotent: 2 devices mark cùng lúc thì một bên thành no-op,
        // store tự giải quyết, không cần lock ở tầng trên
        let rows = sqlx::query(
            r#"
            INSERT INTO message_read_receipts (message_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    async fn unread_message_ids(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<Uuid>, error::SystemError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT m.id FROM messages m
            WHERE m.conversation_id = $1
              AND m.sender_id <> $2
              AND NOT EXISTS (
                  SELECT 1 FROM message_read_receipts r
                  WHERE r.message_id = m.id AND r.user_id = $2
              )
            ORDER BY m.created_at ASC, m.id ASC
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn unread_count(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<i64, error::SystemError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages m
            WHERE m.conversation_id = $1
              AND m.sender_id <> $2
              AND NOT EXISTS (
                  SELECT 1 FROM message_read_receipts r
                  WHERE r.message_id = m.id AND r.user_id = $2
              )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn edit(
        &self,
        message_id: &Uuid,
        content: &str,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            "UPDATE messages SET content = $2, is_edited = true, edited_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(message_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError> {
        let rows = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }
}
