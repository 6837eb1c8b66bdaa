//! Postgres-backed warehouse reads.
//!
//! Each call runs on its own short-lived connection (see [`Database`]).
//! Columns are cast in SQL to the widths decoded here so that schema drift
//! between `INTEGER` and `BIGINT` does not break decoding.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::warn;

use scanfleet_core::{LocationId, RobotCode, WarehouseRef};
use scanfleet_fleet::{Coordinate, GridBounds, Location, Robot, Warehouse};
use scanfleet_inventory::ProductSnapshot;

use super::{Fetch, WarehouseStore};
use crate::db::{Database, DbError};

const WAREHOUSES_SQL: &str = r#"
    SELECT id::BIGINT AS id, code, name,
           zone_max_size::INT AS zone_max_size,
           row_max_size::INT AS row_max_size,
           shelf_max_size::INT AS shelf_max_size
    FROM warehouses
    WHERE is_deleted = FALSE
"#;

const ROBOTS_SQL: &str = r#"
    SELECT r.robot_code, w.code AS warehouse_code
    FROM robots r
    LEFT JOIN warehouses w ON w.id = r.warehouse_id
    WHERE r.is_deleted = FALSE
"#;

const WAREHOUSE_BY_CODE_SQL: &str = "SELECT id::BIGINT FROM warehouses WHERE code = $1 LIMIT 1";

const LOCATIONS_SQL: &str = r#"
    SELECT id::BIGINT AS id, zone::INT AS zone, "row"::INT AS "row", shelf::INT AS shelf
    FROM location
    WHERE warehouse_id = $1
"#;

const CONTENTS_SQL: &str = r#"
    SELECT DISTINCT ON (ih.product_id)
           ih.product_id::BIGINT AS product_id, p.sku_code, p.name,
           ih.quantity::BIGINT AS quantity
    FROM inventory_history ih
    JOIN products p ON p.id = ih.product_id
    WHERE ih.location_id = $1
    ORDER BY ih.product_id, ih.scanned_at DESC
"#;

const TOKEN_SQL: &str = r#"
    SELECT rt.token
    FROM robot_tokens rt
    JOIN robots r ON r.id = rt.robot_id
    WHERE r.robot_code = $1
    ORDER BY rt.created_at DESC
    LIMIT 1
"#;

const TOKENS_SQL: &str = r#"
    SELECT DISTINCT ON (r.robot_code) r.robot_code, rt.token
    FROM robot_tokens rt
    JOIN robots r ON r.id = rt.robot_id
    WHERE r.robot_code = ANY($1)
    ORDER BY r.robot_code, rt.created_at DESC
"#;

#[derive(Debug, Clone)]
pub struct PostgresWarehouseStore {
    db: Database,
}

impl PostgresWarehouseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Log a failed read and turn the outcome into a [`Fetch`].
fn settle<T>(op: &'static str, result: Result<Fetch<T>, DbError>) -> Fetch<T> {
    result.unwrap_or_else(|e| {
        warn!(op, error = %e, "store read failed");
        Fetch::Failed(e.to_string())
    })
}

fn decode<T>(
    op: &'static str,
    rows: Vec<PgRow>,
    f: impl Fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, DbError> {
    rows.iter()
        .map(|row| f(row).map_err(|source| DbError::Query { op, source }))
        .collect()
}

fn non_negative(value: Option<i32>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

fn warehouse_from_row(row: &PgRow) -> Result<Warehouse, sqlx::Error> {
    Ok(Warehouse {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
        bounds: GridBounds::from_store(
            row.try_get("zone_max_size")?,
            row.try_get("row_max_size")?,
            row.try_get("shelf_max_size")?,
        ),
    })
}

fn location_from_row(row: &PgRow) -> Result<Location, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    Ok(Location::new(
        id,
        Coordinate {
            zone: non_negative(row.try_get("zone")?),
            row: non_negative(row.try_get("row")?),
            shelf: non_negative(row.try_get("shelf")?),
        },
    ))
}

fn product_from_row(row: &PgRow) -> Result<ProductSnapshot, sqlx::Error> {
    let product_id: i64 = row.try_get("product_id")?;
    let sku: Option<String> = row.try_get("sku_code")?;
    let name: Option<String> = row.try_get("name")?;
    let quantity: Option<i64> = row.try_get("quantity")?;
    Ok(ProductSnapshot::new(
        sku.unwrap_or_else(|| product_id.to_string()),
        name.unwrap_or_default(),
        quantity.unwrap_or(0),
    ))
}

#[async_trait]
impl WarehouseStore for PostgresWarehouseStore {
    async fn warehouses(&self) -> Fetch<Vec<Warehouse>> {
        const OP: &str = "warehouses";
        let result = self
            .db
            .with_connection::<Vec<PgRow>, _>(OP, |conn| {
                Box::pin(sqlx::query(WAREHOUSES_SQL).fetch_all(conn))
            })
            .await
            .and_then(|rows| decode(OP, rows, warehouse_from_row))
            .map(Fetch::from_vec);
        settle(OP, result)
    }

    async fn robots(&self) -> Fetch<Vec<Robot>> {
        const OP: &str = "robots";
        let result = self
            .db
            .with_connection::<Vec<PgRow>, _>(OP, |conn| Box::pin(sqlx::query(ROBOTS_SQL).fetch_all(conn)))
            .await
            .and_then(|rows| {
                decode(OP, rows, |row| {
                    let code: Option<String> = row.try_get("robot_code")?;
                    let warehouse: Option<String> = row.try_get("warehouse_code")?;
                    Ok(code
                        .filter(|c| !c.trim().is_empty())
                        .map(|c| Robot::new(RobotCode::new(c), warehouse)))
                })
            })
            .map(|rows| Fetch::from_vec(rows.into_iter().flatten().collect()));
        settle(OP, result)
    }

    async fn locations(&self, warehouse: &WarehouseRef) -> Fetch<Vec<Location>> {
        const OP: &str = "locations";
        let warehouse = warehouse.clone();
        let result = self
            .db
            .with_connection::<Vec<PgRow>, _>(OP, move |conn| {
                Box::pin(async move {
                    let id = match warehouse {
                        WarehouseRef::Id(id) => Some(id),
                        WarehouseRef::Code(code) => {
                            sqlx::query_scalar::<_, i64>(WAREHOUSE_BY_CODE_SQL)
                                .bind(code)
                                .fetch_optional(&mut *conn)
                                .await?
                        }
                    };
                    match id {
                        Some(id) => sqlx::query(LOCATIONS_SQL).bind(id).fetch_all(&mut *conn).await,
                        None => Ok(Vec::new()),
                    }
                })
            })
            .await
            .and_then(|rows| decode(OP, rows, location_from_row))
            .map(Fetch::from_vec);
        settle(OP, result)
    }

    async fn location_contents(&self, location: &LocationId) -> Fetch<Vec<ProductSnapshot>> {
        const OP: &str = "location_contents";
        // Only numeric ids exist in the store; fabricated grid ids have no rows.
        let id = match location {
            LocationId::Numeric(id) => *id,
            LocationId::Text(text) => match text.trim().parse::<i64>() {
                Ok(id) => id,
                Err(_) => return Fetch::Empty,
            },
        };
        let result = self
            .db
            .with_connection::<Vec<PgRow>, _>(OP, move |conn| {
                Box::pin(sqlx::query(CONTENTS_SQL).bind(id).fetch_all(conn))
            })
            .await
            .and_then(|rows| decode(OP, rows, product_from_row))
            .map(Fetch::from_vec);
        settle(OP, result)
    }

    async fn robot_token(&self, robot: &RobotCode) -> Fetch<String> {
        const OP: &str = "robot_token";
        let code = robot.as_str().to_string();
        let result = self
            .db
            .with_connection::<Option<Option<String>>, _>(OP, move |conn| {
                Box::pin(
                    sqlx::query_scalar::<_, Option<String>>(TOKEN_SQL)
                        .bind(code)
                        .fetch_optional(conn),
                )
            })
            .await
            .map(|token| Fetch::from(token.flatten().filter(|t| !t.is_empty())));
        settle(OP, result)
    }

    async fn robot_tokens(&self, robots: &[RobotCode]) -> Fetch<HashMap<RobotCode, String>> {
        const OP: &str = "robot_tokens";
        if robots.is_empty() {
            return Fetch::Empty;
        }
        let codes: Vec<String> = robots.iter().map(|r| r.as_str().to_string()).collect();
        let result = self
            .db
            .with_connection::<Vec<PgRow>, _>(OP, move |conn| {
                Box::pin(sqlx::query(TOKENS_SQL).bind(codes).fetch_all(conn))
            })
            .await
            .and_then(|rows| {
                decode(OP, rows, |row| {
                    let code: String = row.try_get("robot_code")?;
                    let token: Option<String> = row.try_get("token")?;
                    Ok(token.filter(|t| !t.is_empty()).map(|t| (RobotCode::new(code), t)))
                })
            })
            .map(|rows| Fetch::from_map(rows.into_iter().flatten().collect()));
        settle(OP, result)
    }
}
