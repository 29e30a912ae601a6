use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use super::dto::ProfileResponse;
use super::repo;
use super::repo_types::Profile;
use crate::state::AppState;
use crate::storage::{avatar_key, AVATAR_URL_TTL_SECS};

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

pub async fn to_response(st: &AppState, profile: Profile) -> anyhow::Result<ProfileResponse> {
    let avatar_url = match profile.avatar_key.as_deref() {
        Some(key) => Some(
            st.storage
                .presign_get(key, AVATAR_URL_TTL_SECS)
                .await
                .with_context(|| format!("presign avatar {}", key))?,
        ),
        None => None,
    };
    Ok(ProfileResponse {
        user_id: profile.user_id,
        display_name: profile.display_name,
        email: profile.email,
        avatar_url,
        updated_at: profile.updated_at,
    })
}

/// Uploads a new avatar, points the profile at it and removes the object
/// it replaced. Returns the new key.
pub async fn replace_avatar(
    st: &AppState,
    user_id: Uuid,
    body: Bytes,
    content_type: &str,
    ext: &str,
) -> anyhow::Result<String> {
    let key = avatar_key(user_id, ext);
    st.storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let previous = repo::set_avatar(&st.db, user_id, &key)
        .await
        .context("store avatar key")?;

    if let Some(old) = previous.filter(|old| *old != key) {
        // best effort
        if let Err(e) = st.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "failed to delete previous avatar");
        }
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn image_types_map_to_extensions() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("application/pdf"), None);
    }

    #[tokio::test]
    async fn response_carries_presigned_avatar_url() {
        let st = AppState::fake();
        let user_id = Uuid::new_v4();
        let profile = Profile {
            user_id,
            display_name: Some("Sanne".into()),
            email: None,
            avatar_key: Some("avatars/a.png".into()),
            updated_at: OffsetDateTime::now_utc(),
        };
        let resp = to_response(&st, profile).await.unwrap();
        assert_eq!(resp.avatar_url.as_deref(), Some("https://fake.local/avatars/a.png"));
        assert_eq!(resp.display_name.as_deref(), Some("Sanne"));
        assert_eq!(resp.user_id, user_id);
    }

    #[tokio::test]
    async fn lazily_created_profile_has_no_avatar_url() {
        let st = AppState::fake();
        let profile = Profile {
            user_id: Uuid::new_v4(),
            display_name: None,
            email: None,
            avatar_key: None,
            updated_at: OffsetDateTime::now_utc(),
        };
        let resp = to_response(&st, profile).await.unwrap();
        assert!(resp.avatar_url.is_none());
    }
}
