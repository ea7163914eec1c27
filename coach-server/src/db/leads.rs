//! Lead persistence

use chrono::{DateTime, Utc};
use coach_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Lead {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub name: String,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(coach_id: Uuid, name: String, source: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            coach_id,
            name,
            source,
            created_at: coach_common::time::now(),
        }
    }
}

pub async fn insert_lead(pool: &SqlitePool, lead: &Lead) -> Result<()> {
    sqlx::query("INSERT INTO leads (id, coach_id, name, source, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(lead.id.to_string())
        .bind(lead.coach_id.to_string())
        .bind(&lead.name)
        .bind(&lead.source)
        .bind(lead.created_at)
        .execute(pool)
        .await?;

    Ok(())
}

/// Creation times of every lead a coach owns, oldest first
pub async fn lead_timestamps(pool: &SqlitePool, coach_id: Uuid) -> Result<Vec<DateTime<Utc>>> {
    let timestamps: Vec<DateTime<Utc>> =
        sqlx::query_scalar("SELECT created_at FROM leads WHERE coach_id = ? ORDER BY created_at")
            .bind(coach_id.to_string())
            .fetch_all(pool)
            .await?;
    Ok(timestamps)
}
