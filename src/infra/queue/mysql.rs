//! MySQL work-queue adapter over the shared `tblCRQueryQueue` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use crate::config::MysqlConfig;
use crate::core::{JobClass, QueueCounts, SchedulerError, WorkItem, WorkQueue};

const ROW_COLUMNS: &str = "
    CAST(pkQueryQueueID AS SIGNED) AS id,
    runStatus AS status,
    runError AS error,
    CAST(runTime AS SIGNED) AS run_time,
    runRepeat AS run_repeat,
    CAST(runFirst AS DATETIME) AS first_run,
    CAST(runLast AS DATETIME) AS last_run,
    CAST(runNext AS DATETIME) AS next_run,
    queryName AS name,
    querySignature AS signature";

const UPDATE_DUE: &str =
    "runStatus = 'completed' AND runRepeat IS NOT NULL AND (runNext IS NULL OR runNext <= NOW())";

#[derive(FromRow)]
struct QueueRow {
    id: i64,
    status: String,
    error: Option<String>,
    run_time: Option<i64>,
    run_repeat: Option<String>,
    first_run: Option<NaiveDateTime>,
    last_run: Option<NaiveDateTime>,
    next_run: Option<NaiveDateTime>,
    name: String,
    signature: String,
}

impl From<QueueRow> for WorkItem {
    fn from(row: QueueRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            error: row.error,
            run_time: row.run_time,
            repeat: row.run_repeat,
            first_run: row.first_run,
            last_run: row.last_run,
            next_run: row.next_run,
            name: row.name,
            signature: row.signature,
        }
    }
}

#[derive(FromRow)]
struct CountsRow {
    total_pending: i64,
    total_update: i64,
}

fn store_error(op: &str, e: &sqlx::Error) -> SchedulerError {
    SchedulerError::Store(format!("{op}: {e}"))
}

/// Work queue backed by a MySQL connection pool.
#[derive(Clone)]
pub struct MySqlWorkQueue {
    pool: MySqlPool,
    table: String,
}

impl MySqlWorkQueue {
    /// Wrap an existing pool; `table` must be a validated identifier.
    #[must_use]
    pub fn new(pool: MySqlPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Connect using `cfg` and verify the server answers.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Store`] when the URL is malformed or the server is
    /// unreachable.
    pub async fn connect(cfg: &MysqlConfig) -> Result<Self, SchedulerError> {
        let options = match &cfg.url {
            Some(url) => url
                .parse::<MySqlConnectOptions>()
                .map_err(|e| store_error("invalid DATABASE_URL", &e))?,
            None => MySqlConnectOptions::new()
                .host(&cfg.hostname)
                .port(cfg.port)
                .username(&cfg.username)
                .password(&cfg.password)
                .database(&cfg.database),
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.max_connections)
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| store_error("cannot connect to MySQL", &e))?;

        debug!(table = %cfg.table, "connected to work-queue database");
        Ok(Self::new(pool, cfg.table.clone()))
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn counts_sql(&self) -> String {
        format!(
            "SELECT
                COUNT(IF(runStatus = 'pending', 1, NULL)) AS total_pending,
                COUNT(IF(runStatus = 'completed', 1, NULL)) AS total_update
            FROM {table}
            WHERE runStatus = 'pending' OR ({UPDATE_DUE})",
            table = self.table
        )
    }

    fn eligible_sql(&self, class: JobClass) -> Option<String> {
        let (filter, order) = match class {
            JobClass::Pending => ("runStatus = 'pending'", "runFirst IS NULL DESC, pkQueryQueueID ASC"),
            JobClass::Update => (
                UPDATE_DUE,
                "runFirst IS NULL DESC, runLast IS NULL DESC, pkQueryQueueID ASC",
            ),
            JobClass::Maintenance => return None,
        };
        Some(format!(
            "SELECT {ROW_COLUMNS} FROM {table} WHERE {filter} ORDER BY {order} LIMIT ?",
            table = self.table
        ))
    }
}

#[async_trait]
impl WorkQueue for MySqlWorkQueue {
    async fn counts(&self) -> Result<QueueCounts, SchedulerError> {
        let row = sqlx::query_as::<_, CountsRow>(&self.counts_sql())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("cannot select allocation from work queue", &e))?;

        let to_count = |n: i64| {
            u64::try_from(n).map_err(|_| SchedulerError::Store(format!("negative row count {n}")))
        };
        Ok(QueueCounts {
            pending: to_count(row.total_pending)?,
            update: to_count(row.total_update)?,
        })
    }

    async fn eligible(&self, class: JobClass, limit: u32) -> Result<Vec<WorkItem>, SchedulerError> {
        let Some(sql) = self.eligible_sql(class) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, QueueRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error(&format!("cannot select {class} jobs from work queue"), &e))?;

        Ok(rows.into_iter().map(WorkItem::from).collect())
    }
}
