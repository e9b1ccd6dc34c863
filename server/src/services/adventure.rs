//! Adventure service — CRUD, password verification, and turn order.
//!
//! DESIGN
//! ======
//! Adventures are the top-level container: one row per campaign, with an
//! optional password gating the host role. Creating and listing happen over
//! REST; turn order is the one adventure-level field mutated over WS.
//!
//! PASSWORDS
//! =========
//! Stored as `salt$digest` where both halves are lowercase hex and the digest
//! is SHA-256 over the salt hex concatenated with the password. Listing never
//! returns hashes, only a `has_password` flag so clients know whether to
//! prompt.

use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use frames::ErrorCode;

use crate::services::session::bytes_to_hex;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AdventureError {
    #[error("adventure not found: {0}")]
    NotFound(Uuid),
    #[error("password required")]
    PasswordRequired,
    #[error("password invalid")]
    PasswordInvalid,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for AdventureError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ADVENTURE_NOT_FOUND",
            Self::PasswordRequired => "E_PASSWORD_REQUIRED",
            Self::PasswordInvalid => "E_PASSWORD_INVALID",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Row returned from adventure listings. Password hashes never leave the
/// service; callers only see whether one is set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdventureRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub has_password: bool,
    pub created_at: String,
}

// =============================================================================
// PASSWORDS
// =============================================================================

#[must_use]
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::rng().fill_bytes(&mut salt);
    let salt_hex = bytes_to_hex(&salt);

    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    let digest_hex = bytes_to_hex(&hasher.finalize());

    format!("{salt_hex}${digest_hex}")
}

#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };

    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize()) == digest_hex
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a new adventure. An empty or missing password leaves the adventure
/// open: any client can claim the host role.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_adventure(
    pool: &PgPool,
    name: &str,
    description: &str,
    password: Option<&str>,
) -> Result<AdventureRow, AdventureError> {
    let id = Uuid::new_v4();
    let password_hash = password.filter(|p| !p.is_empty()).map(hash_password);

    let created_at: String = sqlx::query_scalar(
        "INSERT INTO adventures (id, name, description, password_hash)
         VALUES ($1, $2, $3, $4)
         RETURNING created_at::text",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(&password_hash)
    .fetch_one(pool)
    .await?;

    info!(%id, name, "created adventure");
    Ok(AdventureRow {
        id,
        name: name.to_string(),
        description: description.to_string(),
        has_password: password_hash.is_some(),
        created_at,
    })
}

/// List all adventures, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_adventures(pool: &PgPool) -> Result<Vec<AdventureRow>, AdventureError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, bool, String)>(
        "SELECT id, name, description, password_hash IS NOT NULL, created_at::text
         FROM adventures
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, description, has_password, created_at)| AdventureRow {
            id,
            name,
            description,
            has_password,
            created_at,
        })
        .collect())
}

/// Check a password attempt against the stored hash. Open adventures (no
/// hash) accept anything, including no password at all.
///
/// # Errors
///
/// Returns `NotFound` for an unknown adventure, `PasswordRequired` when the
/// adventure has a password and none was supplied, and `PasswordInvalid` on a
/// mismatch.
pub async fn verify_adventure_password(
    pool: &PgPool,
    adventure_id: Uuid,
    password: Option<&str>,
) -> Result<(), AdventureError> {
    let row = sqlx::query_as::<_, (Option<String>,)>(
        "SELECT password_hash FROM adventures WHERE id = $1",
    )
    .bind(adventure_id)
    .fetch_optional(pool)
    .await?;

    let Some((stored,)) = row else {
        return Err(AdventureError::NotFound(adventure_id));
    };
    let Some(stored) = stored else {
        return Ok(());
    };

    let Some(attempt) = password.filter(|p| !p.is_empty()) else {
        return Err(AdventureError::PasswordRequired);
    };
    if !verify_password(attempt, &stored) {
        return Err(AdventureError::PasswordInvalid);
    }
    Ok(())
}

/// Delete an adventure and, via FK cascade, all of its maps. Requires the
/// same password check as claiming the host role.
///
/// # Errors
///
/// Returns `NotFound` for an unknown adventure and the password errors from
/// [`verify_adventure_password`].
pub async fn delete_adventure(
    pool: &PgPool,
    adventure_id: Uuid,
    password: Option<&str>,
) -> Result<(), AdventureError> {
    verify_adventure_password(pool, adventure_id, password).await?;

    let result = sqlx::query("DELETE FROM adventures WHERE id = $1")
        .bind(adventure_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AdventureError::NotFound(adventure_id));
    }
    info!(%adventure_id, "deleted adventure");
    Ok(())
}

/// Check whether an adventure exists. Used by the open observer join path,
/// which has no password gate to piggyback on.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn adventure_exists(pool: &PgPool, adventure_id: Uuid) -> Result<bool, AdventureError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM adventures WHERE id = $1)")
        .bind(adventure_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

// =============================================================================
// TURN ORDER
// =============================================================================

/// Persist the turn roster for an adventure.
///
/// # Errors
///
/// Returns `NotFound` for an unknown adventure or a database error if the
/// update fails.
pub async fn update_turn_order(
    pool: &PgPool,
    adventure_id: Uuid,
    turn_order: &serde_json::Value,
) -> Result<(), AdventureError> {
    let result = sqlx::query("UPDATE adventures SET turn_order = $2 WHERE id = $1")
        .bind(adventure_id)
        .bind(turn_order)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AdventureError::NotFound(adventure_id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "adventure_test.rs"]
mod tests;
