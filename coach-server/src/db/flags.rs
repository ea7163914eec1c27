//! Flag and escalation persistence
//!
//! Flags are loaded per customer into an [`EscalationGraph`] snapshot.
//! Escalations are written through the same graph so its link policy (no
//! cycles, one target per flag) is checked before anything is stored; the
//! unique index on `flag_escalations.from_flag_id` backs this up against
//! concurrent writers.

use chrono::{DateTime, Utc};
use coach_common::flags::RequirementRef;
use coach_common::{Error, EscalationGraph, Flag, FlagColor, FlagId, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::parse_uuid;

const FLAG_COLUMNS: &str = r#"
    SELECT f.id, f.customer_id, f.color, f.comment, f.created_at,
           r.title AS requirement_title, r.description AS requirement_description
    FROM flags f
    LEFT JOIN requirements r ON r.id = f.requirement_id
"#;

/// Flag to be recorded for a customer
#[derive(Debug, Clone)]
pub struct NewFlag {
    pub customer_id: Uuid,
    pub color: FlagColor,
    pub requirement_id: Option<Uuid>,
    pub comment: Option<String>,
}

/// Row as written to `flags`
#[derive(Debug, Clone)]
pub struct StoredFlag {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub color: FlagColor,
    pub requirement_id: Option<Uuid>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredFlag {
    fn from_new(new: &NewFlag) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: new.customer_id,
            color: new.color,
            requirement_id: new.requirement_id,
            comment: new.comment.clone(),
            created_at: coach_common::time::now(),
        }
    }
}

/// Escalate existing flags of one customer into a new flag
#[derive(Debug, Clone)]
pub struct Escalation {
    pub flag: NewFlag,
    pub from_flag_ids: Vec<Uuid>,
}

fn flag_from_row(row: &SqliteRow) -> Result<(Uuid, Flag)> {
    let id: String = row.try_get("id")?;
    let customer_id: String = row.try_get("customer_id")?;
    let color: String = row.try_get("color")?;
    let requirement_title: Option<String> = row.try_get("requirement_title")?;

    let flag = Flag {
        id: FlagId::new(id),
        color: color.parse()?,
        created_at: row.try_get("created_at")?,
        comment: row.try_get("comment")?,
        requirement: match requirement_title {
            Some(title) => Some(RequirementRef {
                title,
                description: row.try_get("requirement_description")?,
            }),
            None => None,
        },
    };

    Ok((parse_uuid(&customer_id)?, flag))
}

async fn insert_flag_row(conn: &mut SqliteConnection, flag: &StoredFlag) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO flags (id, customer_id, color, requirement_id, comment, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(flag.id.to_string())
    .bind(flag.customer_id.to_string())
    .bind(flag.color.as_str())
    .bind(flag.requirement_id.map(|id| id.to_string()))
    .bind(&flag.comment)
    .bind(flag.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Record a standalone flag
pub async fn insert_flag(pool: &SqlitePool, new: &NewFlag) -> Result<StoredFlag> {
    let flag = StoredFlag::from_new(new);
    let mut conn = pool.acquire().await?;
    insert_flag_row(&mut conn, &flag).await?;

    debug!(flag_id = %flag.id, customer_id = %flag.customer_id, color = %flag.color, "Recorded flag");
    Ok(flag)
}

async fn load_graph_on(conn: &mut SqliteConnection, customer_id: Uuid) -> Result<EscalationGraph> {
    let customer = customer_id.to_string();

    let rows = sqlx::query(&format!(
        "{} WHERE f.customer_id = ? ORDER BY f.created_at, f.id",
        FLAG_COLUMNS
    ))
    .bind(&customer)
    .fetch_all(&mut *conn)
    .await?;

    let mut graph = EscalationGraph::new();
    for row in &rows {
        let (_, flag) = flag_from_row(row)?;
        graph.insert(flag)?;
    }

    let links = sqlx::query(
        r#"
        SELECT e.from_flag_id, e.to_flag_id
        FROM flag_escalations e
        JOIN flags f ON f.id = e.to_flag_id
        WHERE f.customer_id = ?
        ORDER BY e.to_flag_id, e.position
        "#,
    )
    .bind(&customer)
    .fetch_all(&mut *conn)
    .await?;

    for link in &links {
        let from: String = link.try_get("from_flag_id")?;
        let to: String = link.try_get("to_flag_id")?;
        graph.restore_link(&FlagId::new(from), &FlagId::new(to));
    }

    Ok(graph)
}

/// Snapshot of one customer's flags and escalation links
pub async fn load_customer_graph(pool: &SqlitePool, customer_id: Uuid) -> Result<EscalationGraph> {
    let mut conn = pool.acquire().await?;
    load_graph_on(&mut conn, customer_id).await
}

/// Snapshots for every customer of one coach (or all coaches)
///
/// Customers without flags are absent from the map.
pub async fn load_graphs(
    pool: &SqlitePool,
    coach_id: Option<Uuid>,
) -> Result<HashMap<Uuid, EscalationGraph>> {
    load_graphs_matching(
        pool,
        "(?1 IS NULL OR c.coach_id = ?1)",
        coach_id.map(|id| id.to_string()),
    )
    .await
}

/// Snapshots for the listed customers only
///
/// Customers without flags are absent from the map.
pub async fn load_graphs_for_customers(
    pool: &SqlitePool,
    customer_ids: &[Uuid],
) -> Result<HashMap<Uuid, EscalationGraph>> {
    if customer_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let ids = serde_json::to_string(customer_ids)
        .map_err(|e| Error::Internal(format!("Failed to encode customer ids: {}", e)))?;

    load_graphs_matching(
        pool,
        "c.id IN (SELECT value FROM json_each(?1))",
        Some(ids),
    )
    .await
}

/// `condition` filters on `customers c` and may reference `?1`
async fn load_graphs_matching(
    pool: &SqlitePool,
    condition: &str,
    param: Option<String>,
) -> Result<HashMap<Uuid, EscalationGraph>> {
    let rows = sqlx::query(&format!(
        "{} JOIN customers c ON c.id = f.customer_id
         WHERE {}
         ORDER BY f.created_at, f.id",
        FLAG_COLUMNS, condition
    ))
    .bind(&param)
    .fetch_all(pool)
    .await?;

    let mut graphs: HashMap<Uuid, EscalationGraph> = HashMap::new();
    for row in &rows {
        let (customer_id, flag) = flag_from_row(row)?;
        graphs.entry(customer_id).or_default().insert(flag)?;
    }

    let links = sqlx::query(&format!(
        "SELECT e.from_flag_id, e.to_flag_id, f.customer_id
         FROM flag_escalations e
         JOIN flags f ON f.id = e.to_flag_id
         JOIN customers c ON c.id = f.customer_id
         WHERE {}
         ORDER BY e.to_flag_id, e.position",
        condition
    ))
    .bind(&param)
    .fetch_all(pool)
    .await?;

    for link in &links {
        let customer_id: String = link.try_get("customer_id")?;
        let from: String = link.try_get("from_flag_id")?;
        let to: String = link.try_get("to_flag_id")?;
        if let Some(graph) = graphs.get_mut(&parse_uuid(&customer_id)?) {
            graph.restore_link(&FlagId::new(from), &FlagId::new(to));
        }
    }

    Ok(graphs)
}

fn conflict_on_unique(err: sqlx::Error, message: String) -> Error {
    let unique = err
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);
    if unique {
        Error::Conflict(message)
    } else {
        Error::Database(err)
    }
}

/// Create the escalated flag and link every ancestor to it atomically
///
/// Ancestors must belong to the same customer and must not have been
/// escalated before. Duplicate ancestor ids are collapsed, keeping the
/// first occurrence's position.
pub async fn escalate(pool: &SqlitePool, escalation: &Escalation) -> Result<StoredFlag> {
    let mut ancestors: Vec<FlagId> = Vec::with_capacity(escalation.from_flag_ids.len());
    for id in &escalation.from_flag_ids {
        let id = FlagId::from(*id);
        if !ancestors.contains(&id) {
            ancestors.push(id);
        }
    }
    if ancestors.is_empty() {
        return Err(Error::InvalidInput(
            "An escalation needs at least one ancestor flag".to_string(),
        ));
    }

    let customer_id = escalation.flag.customer_id;
    // Take the write lock before reading so a concurrent escalation waits
    // instead of failing on a stale snapshot
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;
    let mut graph = load_graph_on(&mut tx, customer_id).await?;

    for ancestor in &ancestors {
        if graph.get(ancestor).is_none() {
            return Err(Error::NotFound(format!(
                "Flag {} not found for customer {}",
                ancestor, customer_id
            )));
        }
    }

    let stored = StoredFlag::from_new(&escalation.flag);
    let target = FlagId::from(stored.id);
    graph.insert(Flag::new(target.clone(), stored.color, stored.created_at))?;
    for ancestor in &ancestors {
        graph.link(ancestor, &target)?;
    }

    insert_flag_row(&mut tx, &stored).await?;
    for (position, ancestor) in ancestors.iter().enumerate() {
        sqlx::query(
            "INSERT INTO flag_escalations (from_flag_id, to_flag_id, position) VALUES (?, ?, ?)",
        )
        .bind(ancestor.as_str())
        .bind(target.as_str())
        .bind(position as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, format!("Flag {} was already escalated", ancestor)))?;
    }

    tx.commit().await?;

    info!(
        flag_id = %stored.id,
        customer_id = %customer_id,
        ancestors = ancestors.len(),
        "Escalated flags into new {} flag",
        stored.color
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::coaches::create_coach;
    use crate::db::customers::{insert_customer, Customer};
    use crate::db::requirements::{insert_requirement, Requirement};
    use coach_common::db::init_memory_database;
    use coach_common::EscalationError;

    async fn setup() -> (SqlitePool, Uuid, Uuid) {
        let pool = init_memory_database().await.unwrap();
        let (coach, _) = create_coach(&pool, "Coach", Role::Coach).await.unwrap();
        let customer = Customer::new(coach.id, "Customer".into(), None);
        insert_customer(&pool, &customer).await.unwrap();
        (pool, coach.id, customer.id)
    }

    fn new_flag(customer_id: Uuid, color: FlagColor, requirement_id: Option<Uuid>) -> NewFlag {
        NewFlag {
            customer_id,
            color,
            requirement_id,
            comment: None,
        }
    }

    #[tokio::test]
    async fn test_escalation_links_ancestors_in_order() {
        let (pool, coach_id, customer_id) = setup().await;
        let q1 = Requirement::new(coach_id, "Q1".into(), None);
        let q2 = Requirement::new(coach_id, "Q2".into(), Some("second".into()));
        insert_requirement(&pool, &q1).await.unwrap();
        insert_requirement(&pool, &q2).await.unwrap();

        let a1 = insert_flag(&pool, &new_flag(customer_id, FlagColor::Yellow, Some(q1.id))).await.unwrap();
        let a2 = insert_flag(&pool, &new_flag(customer_id, FlagColor::Yellow, Some(q2.id))).await.unwrap();

        let red = escalate(
            &pool,
            &Escalation {
                flag: new_flag(customer_id, FlagColor::Red, None),
                from_flag_ids: vec![a1.id, a2.id, a1.id],
            },
        )
        .await
        .unwrap();

        let graph = load_customer_graph(&pool, customer_id).await.unwrap();
        let titles: Vec<_> = graph
            .collect_ancestors(&FlagId::from(red.id))
            .into_iter()
            .map(|o| o.title)
            .collect();
        assert_eq!(titles, vec!["Q1", "Q2"]);

        let counts = graph.counts();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.red, 1);
        assert_eq!(graph.red_total(), 1);
    }

    #[tokio::test]
    async fn test_second_escalation_of_same_flag_conflicts() {
        let (pool, _, customer_id) = setup().await;
        let a = insert_flag(&pool, &new_flag(customer_id, FlagColor::Yellow, None)).await.unwrap();

        let escalation = Escalation {
            flag: new_flag(customer_id, FlagColor::Red, None),
            from_flag_ids: vec![a.id],
        };
        escalate(&pool, &escalation).await.unwrap();

        let err = escalate(&pool, &escalation).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Escalation(EscalationError::AlreadySuperseded { .. })
        ));

        // Nothing from the failed attempt was stored
        let graph = load_customer_graph(&pool, customer_id).await.unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[tokio::test]
    async fn test_foreign_ancestor_is_not_found() {
        let (pool, coach_id, customer_id) = setup().await;
        let other = Customer::new(coach_id, "Other".into(), None);
        insert_customer(&pool, &other).await.unwrap();
        let foreign = insert_flag(&pool, &new_flag(other.id, FlagColor::Yellow, None)).await.unwrap();

        let err = escalate(
            &pool,
            &Escalation {
                flag: new_flag(customer_id, FlagColor::Red, None),
                from_flag_ids: vec![foreign.id],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_escalation_is_invalid() {
        let (pool, _, customer_id) = setup().await;
        let err = escalate(
            &pool,
            &Escalation {
                flag: new_flag(customer_id, FlagColor::Red, None),
                from_flag_ids: vec![],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_load_graphs_groups_by_customer() {
        let (pool, coach_id, customer_id) = setup().await;
        let second = Customer::new(coach_id, "Second".into(), None);
        insert_customer(&pool, &second).await.unwrap();

        let y = insert_flag(&pool, &new_flag(customer_id, FlagColor::Yellow, None)).await.unwrap();
        insert_flag(&pool, &new_flag(second.id, FlagColor::Green, None)).await.unwrap();
        escalate(
            &pool,
            &Escalation {
                flag: new_flag(customer_id, FlagColor::Red, None),
                from_flag_ids: vec![y.id],
            },
        )
        .await
        .unwrap();

        let graphs = load_graphs(&pool, Some(coach_id)).await.unwrap();
        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[&customer_id].counts().total, 1);
        assert!(graphs[&customer_id].is_superseded(&FlagId::from(y.id)));
        assert_eq!(graphs[&second.id].counts().green, 1);

        assert!(load_graphs(&pool, Some(Uuid::new_v4())).await.unwrap().is_empty());
    }
    #[tokio::test]
    async fn test_load_graphs_for_customers_limits_to_listed_ids() {
        let (pool, coach_id, customer_id) = setup().await;
        let second = Customer::new(coach_id, "Second".into(), None);
        insert_customer(&pool, &second).await.unwrap();
        insert_flag(&pool, &new_flag(customer_id, FlagColor::Yellow, None)).await.unwrap();
        insert_flag(&pool, &new_flag(second.id, FlagColor::Red, None)).await.unwrap();

        let graphs = load_graphs_for_customers(&pool, &[second.id]).await.unwrap();
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[&second.id].counts().red, 1);

        assert!(load_graphs_for_customers(&pool, &[]).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_escalations_of_one_flag_leave_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let pool = coach_common::db::init_database(&dir.path().join("coach.db"))
            .await
            .unwrap();
        let (coach, _) = create_coach(&pool, "Coach", Role::Coach).await.unwrap();
        let customer = Customer::new(coach.id, "Customer".into(), None);
        insert_customer(&pool, &customer).await.unwrap();
        let a = insert_flag(&pool, &new_flag(customer.id, FlagColor::Yellow, None)).await.unwrap();

        let escalation = Escalation {
            flag: new_flag(customer.id, FlagColor::Red, None),
            from_flag_ids: vec![a.id],
        };
        let (first, second) = tokio::join!(
            escalate(&pool, &escalation),
            escalate(&pool, &escalation)
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in &results {
            if let Err(err) = result {
                assert!(
                    matches!(
                        err,
                        Error::Escalation(EscalationError::AlreadySuperseded { .. })
                            | Error::Conflict(_)
                    ),
                    "unexpected error: {:?}",
                    err
                );
            }
        }

        let graph = load_customer_graph(&pool, customer.id).await.unwrap();
        assert_eq!(graph.escalated_to(&FlagId::from(a.id)).len(), 1);
    }
}
