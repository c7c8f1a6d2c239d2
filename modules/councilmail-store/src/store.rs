// SQLite persistence for the councillor directory.
//
// Rows are addressed by position: index in rowid order, which is the order
// `read_all` returns them in. Nothing in a run deletes or reorders rows, and
// inserts append, so a position read at the start of a run is still valid at
// the end of it.

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use tracing::{debug, info};
use uuid::Uuid;

use councilmail_common::{Outcome, PersonRecord};

use crate::error::{Result, StoreError};

/// The result of resolving one row, as it will be written back.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub position: usize,
    pub identity_key: String,
    pub outcome: Outcome,
}

/// Everything a run writes, applied in a single transaction.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    pub run_id: Uuid,
    pub resolutions: Vec<Resolution>,
    pub inserts: Vec<PersonRecord>,
}

impl WriteBatch {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            resolutions: Vec::new(),
            inserts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty() && self.inserts.is_empty()
    }
}

#[derive(sqlx::FromRow)]
struct DataRow {
    councillor: String,
    position: String,
    council_name: String,
    ward: String,
    council_website: String,
    email: String,
}

impl From<DataRow> for PersonRecord {
    fn from(row: DataRow) -> Self {
        Self {
            councillor: row.councillor,
            position: row.position,
            council_name: row.council_name,
            ward: row.ward,
            council_website: row.council_website,
            email: row.email,
        }
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // An in-memory database lives and dies with its connection.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        info!(url, "Store opened");
        Ok(store)
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// All rows in position order. NULL columns read as empty strings.
    pub async fn read_all(&self) -> Result<Vec<PersonRecord>> {
        let rows = sqlx::query_as::<_, DataRow>(
            r#"
            SELECT
                COALESCE(councillor, '') AS councillor,
                COALESCE(position, '') AS position,
                COALESCE(council_name, '') AS council_name,
                COALESCE(ward, '') AS ward,
                COALESCE(council_website, '') AS council_website,
                COALESCE(email, '') AS email
            FROM data
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PersonRecord::from).collect())
    }

    /// Row count, mostly for reporting.
    pub async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM data")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    /// Outcome labels recorded for a run, in the order they were written.
    pub async fn logged_outcomes(&self, run_id: Uuid) -> Result<Vec<(usize, String)>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT position, outcome FROM resolution_log
            WHERE run_id = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(p, o)| (p as usize, o)).collect())
    }

    /// Apply a run's writes atomically: email updates, resolution log rows,
    /// then inserts. Nothing is written if any step fails.
    pub async fn commit(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            debug!(run_id = %batch.run_id, "Nothing to commit");
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let recorded_at = Utc::now().to_rfc3339();
        let run_id = batch.run_id.to_string();

        for resolution in &batch.resolutions {
            let email = resolution.outcome.persisted_email();
            if let Some(email) = email {
                update_email(&mut tx, resolution.position, email).await?;
            }

            sqlx::query(
                r#"
                INSERT INTO resolution_log
                    (run_id, position, identity_key, outcome, email, recorded_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&run_id)
            .bind(resolution.position as i64)
            .bind(&resolution.identity_key)
            .bind(resolution.outcome.label())
            .bind(email)
            .bind(&recorded_at)
            .execute(&mut *tx)
            .await?;
        }

        for record in &batch.inserts {
            insert(&mut tx, record).await?;
        }

        tx.commit().await?;
        info!(
            run_id = %batch.run_id,
            resolutions = batch.resolutions.len(),
            inserts = batch.inserts.len(),
            "Committed run"
        );
        Ok(())
    }

    /// Close the pool, flushing outstanding writes.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Store closed");
    }
}

async fn update_email(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    position: usize,
    email: &str,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE data SET email = ?
        WHERE rowid = (SELECT rowid FROM data ORDER BY rowid ASC LIMIT 1 OFFSET ?)
        "#,
    )
    .bind(email)
    .bind(position as i64)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::PositionOutOfRange { position });
    }
    Ok(())
}

async fn insert(tx: &mut sqlx::Transaction<'_, Sqlite>, record: &PersonRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO data (councillor, position, council_name, ward, council_website, email)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.councillor)
    .bind(&record.position)
    .bind(&record.council_name)
    .bind(&record.ward)
    .bind(&record.council_website)
    .bind(&record.email)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
