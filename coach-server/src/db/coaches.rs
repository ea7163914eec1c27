//! Coach accounts and API tokens

use chrono::{DateTime, Utc};
use coach_common::Result;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::parse_uuid;
use crate::auth::{generate_token, hash_token, Role};

#[derive(Debug, Clone, Serialize)]
pub struct Coach {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

fn coach_from_row(row: &SqliteRow) -> Result<Coach> {
    let id: String = row.try_get("id")?;
    let role: String = row.try_get("role")?;

    Ok(Coach {
        id: parse_uuid(&id)?,
        name: row.try_get("name")?,
        role: role.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

/// Create a coach and return it with its plaintext API token
///
/// The token is not recoverable afterwards.
pub async fn create_coach(pool: &SqlitePool, name: &str, role: Role) -> Result<(Coach, String)> {
    let coach = Coach {
        id: Uuid::new_v4(),
        name: name.to_string(),
        role,
        created_at: coach_common::time::now(),
    };
    let token = generate_token();

    sqlx::query(
        "INSERT INTO coaches (id, name, role, token_hash, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(coach.id.to_string())
    .bind(&coach.name)
    .bind(coach.role.as_str())
    .bind(hash_token(&token))
    .bind(coach.created_at)
    .execute(pool)
    .await?;

    info!(coach_id = %coach.id, role = %coach.role, "Created coach '{}'", coach.name);
    Ok((coach, token))
}

pub async fn find_by_token_hash(pool: &SqlitePool, token_hash: &str) -> Result<Option<Coach>> {
    let row = sqlx::query("SELECT id, name, role, created_at FROM coaches WHERE token_hash = ?")
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(coach_from_row).transpose()
}

pub async fn load_coach(pool: &SqlitePool, id: Uuid) -> Result<Option<Coach>> {
    let row = sqlx::query("SELECT id, name, role, created_at FROM coaches WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(coach_from_row).transpose()
}

pub async fn admin_exists(pool: &SqlitePool) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM coaches WHERE role = 'ADMIN')")
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Create the first admin account if none exists
///
/// Returns the new admin's token so startup can print it once.
pub async fn ensure_admin(pool: &SqlitePool) -> Result<Option<String>> {
    if admin_exists(pool).await? {
        return Ok(None);
    }
    let (_, token) = create_coach(pool, "Administrator", Role::Admin).await?;
    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_common::db::init_memory_database;

    #[tokio::test]
    async fn test_token_lookup_finds_coach() {
        let pool = init_memory_database().await.unwrap();
        let (coach, token) = create_coach(&pool, "Dana", Role::Coach).await.unwrap();

        let found = find_by_token_hash(&pool, &hash_token(&token)).await.unwrap().unwrap();
        assert_eq!(found.id, coach.id);
        assert_eq!(found.role, Role::Coach);

        assert!(find_by_token_hash(&pool, &hash_token("wrong")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_admin_runs_once() {
        let pool = init_memory_database().await.unwrap();

        assert!(ensure_admin(&pool).await.unwrap().is_some());
        assert!(ensure_admin(&pool).await.unwrap().is_none());
        assert!(admin_exists(&pool).await.unwrap());
    }
}
