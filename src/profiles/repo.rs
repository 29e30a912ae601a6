use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Profile;

const COLUMNS: &str = "user_id, display_name, email, avatar_key, updated_at";

/// Returns the user's profile, creating an empty one on first access.
pub async fn get_or_create(db: &PgPool, user_id: Uuid) -> sqlx::Result<Profile> {
    sqlx::query("INSERT INTO profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(db)
        .await?;

    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {COLUMNS} FROM profiles WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_one(db)
    .await
}

/// Sets the given fields, leaving `None` ones untouched.
pub async fn upsert(
    db: &PgPool,
    user_id: Uuid,
    display_name: Option<&str>,
    email: Option<&str>,
) -> sqlx::Result<Profile> {
    sqlx::query_as::<_, Profile>(&format!(
        r#"
        INSERT INTO profiles (user_id, display_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET
            display_name = COALESCE(EXCLUDED.display_name, profiles.display_name),
            email        = COALESCE(EXCLUDED.email, profiles.email),
            updated_at   = now()
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(display_name)
    .bind(email)
    .fetch_one(db)
    .await
}

/// Points the profile at a new avatar object and returns the key it
/// replaced, if any.
pub async fn set_avatar(db: &PgPool, user_id: Uuid, key: &str) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar::<_, Option<String>>(
        r#"
        WITH previous AS (
            SELECT avatar_key FROM profiles WHERE user_id = $1
        )
        INSERT INTO profiles (user_id, avatar_key)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET
            avatar_key = EXCLUDED.avatar_key,
            updated_at = now()
        RETURNING (SELECT avatar_key FROM previous)
        "#,
    )
    .bind(user_id)
    .bind(key)
    .fetch_one(db)
    .await
}

/// Display names for a set of users; users without a profile are absent.
pub async fn display_names(db: &PgPool, user_ids: &[Uuid]) -> sqlx::Result<Vec<(Uuid, Option<String>)>> {
    sqlx::query_as::<_, (Uuid, Option<String>)>(
        "SELECT user_id, display_name FROM profiles WHERE user_id = ANY($1)",
    )
    .bind(user_ids)
    .fetch_all(db)
    .await
}
