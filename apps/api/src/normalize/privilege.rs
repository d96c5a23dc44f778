//! Admin capability check gating cross-user graph mutations.
//!
//! The canonical graph is shared reference data; merge and delete require an
//! admin actor. Lookups go through an injected TTL cache so repeated checks
//! within a window skip the users table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::errors::AppError;
use crate::models::user::User;

pub type AdminCache = TtlCache<Uuid, bool>;

pub async fn is_admin(
    pool: &PgPool,
    cache: &AdminCache,
    user_id: Uuid,
) -> Result<bool, AppError> {
    if let Some(cached) = cache.get(&user_id) {
        return Ok(cached);
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    let admin = user.map(|u| u.tier == "admin").unwrap_or(false);
    cache.insert(user_id, admin);
    Ok(admin)
}

/// `Forbidden` unless the actor is an admin. Unknown users are not admins.
pub async fn require_admin(
    pool: &PgPool,
    cache: &AdminCache,
    user_id: Uuid,
) -> Result<(), AppError> {
    if is_admin(pool, cache, user_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
