//! Requirement persistence
//!
//! Requirements are soft-deleted so that flags raised against them keep
//! their title.

use chrono::{DateTime, Utc};
use coach_common::Result;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Requirement {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Requirement {
    pub fn new(coach_id: Uuid, title: String, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            coach_id,
            title,
            description,
            deleted: false,
            created_at: coach_common::time::now(),
        }
    }
}

fn requirement_from_row(row: &SqliteRow) -> Result<Requirement> {
    let id: String = row.try_get("id")?;
    let coach_id: String = row.try_get("coach_id")?;

    Ok(Requirement {
        id: parse_uuid(&id)?,
        coach_id: parse_uuid(&coach_id)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        deleted: row.try_get("deleted")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_requirement(pool: &SqlitePool, requirement: &Requirement) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO requirements (id, coach_id, title, description, deleted, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(requirement.id.to_string())
    .bind(requirement.coach_id.to_string())
    .bind(&requirement.title)
    .bind(&requirement.description)
    .bind(requirement.deleted)
    .bind(requirement.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a requirement, including soft-deleted ones
pub async fn load_requirement(pool: &SqlitePool, id: Uuid) -> Result<Option<Requirement>> {
    let row = sqlx::query(
        "SELECT id, coach_id, title, description, deleted, created_at FROM requirements WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(requirement_from_row).transpose()
}

/// Active requirements, optionally restricted to one coach
pub async fn list_active(pool: &SqlitePool, coach_id: Option<Uuid>) -> Result<Vec<Requirement>> {
    let rows = sqlx::query(
        r#"
        SELECT id, coach_id, title, description, deleted, created_at
        FROM requirements
        WHERE deleted = 0 AND (?1 IS NULL OR coach_id = ?1)
        ORDER BY created_at, id
        "#,
    )
    .bind(coach_id.map(|id| id.to_string()))
    .fetch_all(pool)
    .await?;

    rows.iter().map(requirement_from_row).collect()
}

/// Mark a requirement deleted; returns false if it was already deleted
pub async fn soft_delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE requirements SET deleted = 1 WHERE id = ? AND deleted = 0")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
