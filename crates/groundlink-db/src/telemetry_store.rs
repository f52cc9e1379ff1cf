//! Latest-reading queries against QuestDB.
//!
//! A deployment splits its sensors across several tables that share a
//! designated timestamp column. One table is primary: its newest row
//! decides the reading timestamp and carries the continuity voltage. The
//! other tables contribute their newest row's values, or `None` for every
//! column when they are still empty or their query fails. A failing
//! secondary table never costs the tick its primary values; it is logged
//! once when it starts failing and once when it recovers.
//!
//! Two polling disciplines are supported, fixed per deployment:
//!
//! - **Latest** -- the primary table's newest row, every tick. The change
//!   filter suppresses repeats.
//! - **Cursor** -- only primary rows newer than the last one seen. When
//!   nothing newer exists the previous reading is returned unchanged.
//!
//! Table and column names come from configuration, so they are checked
//! against a plain-identifier pattern before any SQL is built.

use chrono::{DateTime, NaiveDateTime, Utc};
use groundlink_core::config::{PollDiscipline, SourceConfig, TableConfig, is_sql_identifier};
use groundlink_core::source::{SourceError, TelemetrySource};
use groundlink_types::{ChannelValue, ContinuousReading};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

use crate::error::DbError;
use crate::questdb::{QuestDbConfig, QuestDbPool};

/// Precomputed query for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    table: String,
    columns: Vec<String>,
    latest_sql: String,
}

impl TableQuery {
    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Sensor columns relayed from this table, in wire order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `SELECT` for the table's newest row.
    pub fn latest_sql(&self) -> &str {
        &self.latest_sql
    }
}

/// Every query one poll may run, built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    timestamp_column: String,
    continuity_column: Option<String>,
    primary: TableQuery,
    primary_cursor_sql: String,
    secondaries: Vec<TableQuery>,
}

impl QueryPlan {
    /// Build the plan for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if there is not exactly one primary
    /// table or a name is not a plain identifier.
    pub fn from_config(source: &SourceConfig) -> Result<Self, DbError> {
        let timestamp = checked(&source.timestamp_column)?;
        let continuity = source.continuity_column.as_deref().map(checked).transpose()?;

        let mut primaries = source.tables.iter().filter(|table| table.primary);
        let (Some(primary), None) = (primaries.next(), primaries.next()) else {
            return Err(DbError::Config(
                "exactly one primary table is required".to_owned(),
            ));
        };

        let mut primary_select: Vec<&str> = primary.columns.iter().map(String::as_str).collect();
        if let Some(column) = continuity {
            if !primary_select.contains(&column) {
                primary_select.push(column);
            }
        }

        let primary_query = table_query(primary, timestamp, &primary_select)?;
        let primary_cursor_sql = format!(
            "SELECT {} FROM {} WHERE {timestamp} > $1 ORDER BY {timestamp} DESC LIMIT 1",
            select_list(timestamp, &primary_select),
            primary.name,
        );

        let secondaries = source
            .tables
            .iter()
            .filter(|table| !table.primary)
            .map(|table| {
                let columns: Vec<&str> = table.columns.iter().map(String::as_str).collect();
                table_query(table, timestamp, &columns)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            timestamp_column: timestamp.to_owned(),
            continuity_column: continuity.map(str::to_owned),
            primary: primary_query,
            primary_cursor_sql,
            secondaries,
        })
    }

    /// The primary table's query.
    pub const fn primary(&self) -> &TableQuery {
        &self.primary
    }

    /// `SELECT` for the newest primary row after a cursor bound as `$1`.
    pub fn primary_cursor_sql(&self) -> &str {
        &self.primary_cursor_sql
    }

    /// Queries for the secondary tables, in configuration order.
    pub fn secondaries(&self) -> &[TableQuery] {
        &self.secondaries
    }

    /// Newest values of every secondary table, in wire order.
    async fn fetch_secondaries(&self, pool: &PgPool) -> SecondaryValues {
        let mut secondary = SecondaryValues::default();
        for query in &self.secondaries {
            let outcome = fetch_row(pool, &query.latest_sql, None)
                .await
                .and_then(|row| row.map(|row| decode_values(&row, &query.columns)).transpose());
            secondary.push(query, outcome);
        }
        secondary
    }

    /// Merge a primary row with secondary values into a reading.
    fn assemble(
        &self,
        primary: &PgRow,
        secondary: Vec<ChannelValue>,
    ) -> Result<ContinuousReading, DbError> {
        let timestamp = decode_timestamp(primary, &self.timestamp_column)?;
        let mut values = decode_values(primary, &self.primary.columns)?;
        values.extend(secondary);
        let continuity_raw = match &self.continuity_column {
            Some(column) => decode_value(primary, column)?,
            None => None,
        };
        Ok(ContinuousReading::new(timestamp, values, continuity_raw))
    }
}

/// Channel values contributed by the secondary tables in one poll.
#[derive(Debug, Default)]
struct SecondaryValues {
    values: Vec<ChannelValue>,
    /// Tables whose query failed, with the error text.
    failed: Vec<(String, String)>,
}

impl SecondaryValues {
    /// Add one table's outcome. An empty or failed table reports `None`
    /// for each of its columns.
    fn push(
        &mut self,
        query: &TableQuery,
        outcome: Result<Option<Vec<ChannelValue>>, DbError>,
    ) {
        match outcome {
            Ok(Some(values)) => self.values.extend(values),
            Ok(None) => self.values.extend(missing_values(query)),
            Err(e) => {
                debug!(table = %query.table, error = %e, "Secondary table query failed");
                self.failed.push((query.table.clone(), e.to_string()));
                self.values.extend(missing_values(query));
            }
        }
    }
}

fn missing_values(query: &TableQuery) -> impl Iterator<Item = ChannelValue> + '_ {
    query
        .columns
        .iter()
        .map(|column| ChannelValue::new(column.as_str(), None))
}

/// Secondary tables currently failing, so each outage is logged on its
/// edges instead of every tick.
#[derive(Debug, Default)]
struct SecondaryHealth {
    failing: Vec<String>,
}

impl SecondaryHealth {
    /// Record this poll's failures. Returns the tables that started
    /// failing and the tables that recovered.
    fn update<'a>(
        &mut self,
        failed: &'a [(String, String)],
    ) -> (Vec<&'a (String, String)>, Vec<String>) {
        let started = failed
            .iter()
            .filter(|(table, _)| !self.failing.contains(table))
            .collect();
        let failing: Vec<String> = failed.iter().map(|(table, _)| table.clone()).collect();
        let recovered = std::mem::replace(&mut self.failing, failing)
            .into_iter()
            .filter(|table| !self.failing.contains(table))
            .collect();
        (started, recovered)
    }
}

fn checked(name: &str) -> Result<&str, DbError> {
    if is_sql_identifier(name) {
        Ok(name)
    } else {
        Err(DbError::Config(format!(
            "{name:?} is not a plain SQL identifier"
        )))
    }
}

fn select_list(timestamp: &str, columns: &[&str]) -> String {
    let mut list = String::from(timestamp);
    for column in columns {
        list.push_str(", ");
        list.push_str(column);
    }
    list
}

fn table_query(table: &TableConfig, timestamp: &str, select: &[&str]) -> Result<TableQuery, DbError> {
    let name = checked(&table.name)?;
    for column in select {
        checked(column)?;
    }
    Ok(TableQuery {
        table: name.to_owned(),
        columns: table.columns.clone(),
        latest_sql: format!(
            "SELECT {} FROM {name} ORDER BY {timestamp} DESC LIMIT 1",
            select_list(timestamp, select),
        ),
    })
}

async fn fetch_row(
    pool: &PgPool,
    sql: &str,
    cursor: Option<NaiveDateTime>,
) -> Result<Option<PgRow>, DbError> {
    let mut query = sqlx::query(sql);
    if let Some(cursor) = cursor {
        query = query.bind(cursor);
    }
    Ok(query.fetch_optional(pool).await?)
}

fn decode_error(column: &str, err: &sqlx::Error) -> DbError {
    DbError::Decode {
        column: column.to_owned(),
        reason: err.to_string(),
    }
}

/// Decode the designated timestamp. QuestDB sends `TIMESTAMP` without a
/// zone; values are UTC.
fn decode_timestamp(row: &PgRow, column: &str) -> Result<DateTime<Utc>, DbError> {
    if let Ok(timestamp) = row.try_get::<DateTime<Utc>, _>(column) {
        return Ok(timestamp);
    }
    row.try_get::<NaiveDateTime, _>(column)
        .map(|naive| naive.and_utc())
        .map_err(|e| decode_error(column, &e))
}

#[allow(clippy::cast_precision_loss)]
const fn lossy_i64(value: i64) -> f64 {
    // Integer columns above 2^53 lose precision.
    value as f64
}

/// Decode one sensor value. SQL `NULL` and non-finite numbers are `None`.
fn decode_value(row: &PgRow, column: &str) -> Result<Option<f64>, DbError> {
    let value = row
        .try_get::<Option<f64>, _>(column)
        .or_else(|_| row.try_get::<Option<f32>, _>(column).map(|v| v.map(f64::from)))
        .or_else(|_| row.try_get::<Option<i32>, _>(column).map(|v| v.map(f64::from)))
        .or_else(|_| row.try_get::<Option<i64>, _>(column).map(|v| v.map(lossy_i64)))
        .map_err(|e| decode_error(column, &e))?;
    Ok(value.filter(|v| v.is_finite()))
}

fn decode_values(row: &PgRow, columns: &[String]) -> Result<Vec<ChannelValue>, DbError> {
    columns
        .iter()
        .map(|column| {
            decode_value(row, column).map(|value| ChannelValue::new(column.as_str(), value))
        })
        .collect()
}

/// [`TelemetrySource`] backed by QuestDB.
#[derive(Debug)]
pub struct QuestDbSource {
    config: QuestDbConfig,
    pool: Option<QuestDbPool>,
    plan: QueryPlan,
    discipline: PollDiscipline,
    cursor: Option<DateTime<Utc>>,
    last: Option<ContinuousReading>,
    secondary_health: SecondaryHealth,
}

impl QuestDbSource {
    /// Create a source for `source`, reusing `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the table layout is invalid.
    pub fn new(source: &SourceConfig, pool: QuestDbPool) -> Result<Self, DbError> {
        Ok(Self {
            config: QuestDbConfig::from_source(source),
            pool: Some(pool),
            plan: QueryPlan::from_config(source)?,
            discipline: source.discipline,
            cursor: None,
            last: None,
            secondary_health: SecondaryHealth::default(),
        })
    }

    /// Create the pool and the source in one step.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL or table layout is invalid.
    pub fn connect(source: &SourceConfig) -> Result<Self, DbError> {
        let pool = QuestDbPool::connect(&QuestDbConfig::from_source(source))?;
        Self::new(source, pool)
    }

    /// The queries this source runs.
    pub const fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Timestamp of the newest primary row seen in cursor mode.
    pub const fn cursor(&self) -> Option<DateTime<Utc>> {
        self.cursor
    }

    async fn poll(&mut self) -> Result<Option<ContinuousReading>, DbError> {
        // Reopen after `close` so a restarted loop keeps working.
        if self.pool.is_none() {
            self.pool = Some(QuestDbPool::connect(&self.config)?);
        }
        let Some(pool) = self.pool.as_ref() else {
            return Ok(None);
        };
        let pool = pool.pool();

        let cursor = match self.discipline {
            PollDiscipline::Cursor => self.cursor,
            PollDiscipline::Latest => None,
        };
        let primary_sql = if cursor.is_some() {
            &self.plan.primary_cursor_sql
        } else {
            &self.plan.primary.latest_sql
        };

        let (primary, secondary) = tokio::join!(
            fetch_row(pool, primary_sql, cursor.map(|c| c.naive_utc())),
            self.plan.fetch_secondaries(pool),
        );

        let (started, recovered) = self.secondary_health.update(&secondary.failed);
        for (table, error) in started {
            warn!(
                table = %table,
                error = %error,
                "Secondary table unavailable, its channels read null"
            );
        }
        for table in recovered {
            info!(table = %table, "Secondary table available again");
        }

        let Some(row) = primary? else {
            // Nothing newer than the cursor: repeat the previous reading so
            // switch changes still go out.
            return Ok(if cursor.is_some() { self.last.clone() } else { None });
        };
        let reading = self.plan.assemble(&row, secondary.values)?;

        if self.discipline == PollDiscipline::Cursor {
            self.cursor = Some(reading.timestamp());
            self.last = Some(reading.clone());
        }
        Ok(Some(reading))
    }
}

impl TelemetrySource for QuestDbSource {
    async fn fetch_latest(&mut self) -> Result<Option<ContinuousReading>, SourceError> {
        self.poll().await.map_err(SourceError::from)
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }
}
