//! Customer persistence

use chrono::{DateTime, Utc};
use coach_common::Result;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(coach_id: Uuid, name: String, email: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            coach_id,
            name,
            email,
            created_at: coach_common::time::now(),
        }
    }
}

fn customer_from_row(row: &SqliteRow) -> Result<Customer> {
    let id: String = row.try_get("id")?;
    let coach_id: String = row.try_get("coach_id")?;

    Ok(Customer {
        id: parse_uuid(&id)?,
        coach_id: parse_uuid(&coach_id)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_customer(pool: &SqlitePool, customer: &Customer) -> Result<()> {
    sqlx::query(
        "INSERT INTO customers (id, coach_id, name, email, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(customer.id.to_string())
    .bind(customer.coach_id.to_string())
    .bind(&customer.name)
    .bind(&customer.email)
    .bind(customer.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_customer(pool: &SqlitePool, id: Uuid) -> Result<Option<Customer>> {
    let row = sqlx::query("SELECT id, coach_id, name, email, created_at FROM customers WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(customer_from_row).transpose()
}

/// Count customers, optionally restricted to one coach
pub async fn count_customers(pool: &SqlitePool, coach_id: Option<Uuid>) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE (?1 IS NULL OR coach_id = ?1)")
            .bind(coach_id.map(|id| id.to_string()))
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// One page of customers ordered by name
pub async fn list_customers(
    pool: &SqlitePool,
    coach_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Customer>> {
    let rows = sqlx::query(
        r#"
        SELECT id, coach_id, name, email, created_at
        FROM customers
        WHERE (?1 IS NULL OR coach_id = ?1)
        ORDER BY name COLLATE NOCASE, id
        LIMIT ?2 OFFSET ?3
        "#,
    )
    .bind(coach_id.map(|id| id.to_string()))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(customer_from_row).collect()
}
