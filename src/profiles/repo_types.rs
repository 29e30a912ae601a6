use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Per-user profile row; `avatar_key` points into the object store.
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_key: Option<String>,
    pub updated_at: OffsetDateTime,
}
