use crate::analytics::condition::{ConditionQuery, FilterClause};
use crate::analytics::window::DateRange;
#[cfg(test)]
use crate::models::NewReading;
use crate::models::{ConditionRow, Reading};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::info;

/// Opens the readings store and creates its schema if missing.
///
/// `:memory:` and `sqlite::memory:` get a pool whose connections never
/// expire, so the in-memory database survives for the lifetime of the pool.
pub async fn init_db(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    info!("Initializing database at: {}", database_url);

    let in_memory = database_url == ":memory:" || database_url == "sqlite::memory:";
    let options = if in_memory {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::from_str(database_url)?.create_if_missing(true)
    };

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    };
    let pool = pool_options.connect_with(options).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            ppg_json TEXT NOT NULL,
            hrv REAL NOT NULL,
            stress REAL NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_readings_name_date ON readings(name, date);
        "#,
    )
    .execute(&pool)
    .await?;

    info!("Database initialized and schema applied.");

    Ok(pool)
}

// --- Readings ---

#[cfg(test)]
pub async fn insert_reading(pool: &SqlitePool, reading: &NewReading) -> Result<Reading, sqlx::Error> {
    let ppg_json = serde_json::to_string(&reading.ppg)
        .map_err(|e| sqlx::Error::Protocol(format!("Failed to encode PPG samples: {}", e)))?;

    sqlx::query_as::<_, Reading>(
        r#"
        INSERT INTO readings (name, date, ppg_json, hrv, stress)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, name, date, ppg_json, hrv, stress
        "#,
    )
    .bind(&reading.name)
    .bind(reading.date)
    .bind(ppg_json)
    .bind(reading.hrv)
    .bind(reading.stress)
    .fetch_one(pool)
    .await
}

/// Inserts a row whose PPG text is stored as given, valid JSON or not.
#[cfg(test)]
pub async fn insert_raw_reading(
    pool: &SqlitePool,
    name: &str,
    date: chrono::NaiveDate,
    ppg_json: &str,
    hrv: f64,
    stress: f64,
) -> Result<Reading, sqlx::Error> {
    sqlx::query_as::<_, Reading>(
        r#"
        INSERT INTO readings (name, date, ppg_json, hrv, stress)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, name, date, ppg_json, hrv, stress
        "#,
    )
    .bind(name)
    .bind(date)
    .bind(ppg_json)
    .bind(hrv)
    .bind(stress)
    .fetch_one(pool)
    .await
}

/// Distinct person names, in first-insertion order.
pub async fn fetch_candidate_names(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT name
        FROM readings
        GROUP BY name
        ORDER BY MIN(id) ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Readings ordered by date, optionally restricted to one person and a date range.
pub async fn fetch_readings(
    pool: &SqlitePool,
    name: Option<&str>,
    range: DateRange,
) -> Result<Vec<Reading>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, name, date, ppg_json, hrv, stress FROM readings");
    let mut filter = FilterClause::new();

    if let Some(name) = name {
        filter.push(&mut builder);
        builder.push("name = ").push_bind(name.to_string());
    }
    if let Some(from) = range.from {
        filter.push(&mut builder);
        builder.push("date >= ").push_bind(from);
    }
    if let Some(to) = range.to {
        filter.push(&mut builder);
        builder.push("date <= ").push_bind(to);
    }
    builder.push(" ORDER BY date ASC, id ASC");

    builder.build_query_as::<Reading>().fetch_all(pool).await
}

/// Rows satisfying a compiled numeric condition.
pub async fn fetch_condition_rows(
    pool: &SqlitePool,
    query: &ConditionQuery,
) -> Result<Vec<ConditionRow>, sqlx::Error> {
    let mut builder = query.to_query_builder();
    builder.build_query_as::<ConditionRow>().fetch_all(pool).await
}
