//! Durable storage for the sync queue.
//!
//! The engine only ever talks to a [`QueueStore`]; [`SqliteQueueStore`] is
//! the embedded SQLite implementation used in production. Anything that can
//! satisfy the trait (an in-memory map, another embedded store) can back the
//! queue in tests or on other platforms.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;
use uuid::Uuid;

use crate::{
	item::{QueueItemFilter, SyncQueueItem},
	Error,
};

const LAST_SUCCESS_KEY: &str = "last_success_at";

/// Keyed, durable storage of pending mutation records.
///
/// Implementations report storage failures to the caller and never retry
/// internally. `delete` is idempotent.
#[async_trait]
pub trait QueueStore: Send + Sync + 'static {
	/// Insert or overwrite an item by id.
	async fn put(&self, item: &SyncQueueItem) -> Result<(), Error>;

	async fn get(&self, id: Uuid) -> Result<Option<SyncQueueItem>, Error>;

	async fn delete(&self, id: Uuid) -> Result<(), Error>;

	/// All items matching `filter`, ordered by `created_at` ascending.
	async fn list(&self, filter: QueueItemFilter) -> Result<Vec<SyncQueueItem>, Error>;

	/// Remove every item and all sync metadata. Used on logout so one
	/// user's pending operations never leak into another session.
	async fn clear(&self) -> Result<(), Error>;

	async fn last_success_at(&self) -> Result<Option<DateTime<Utc>>, Error>;

	async fn set_last_success_at(&self, at: DateTime<Utc>) -> Result<(), Error>;
}

/// SQLite-backed [`QueueStore`].
///
/// The `(entity, operation)` composite index keeps filtered listing cheap
/// when the queue grows during extended offline use.
pub struct SqliteQueueStore {
	pool: SqlitePool,
}

impl SqliteQueueStore {
	/// Open (or create) the queue database at `path`.
	pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}

		let pool = SqlitePoolOptions::new()
			.max_connections(4)
			.connect_with(
				SqliteConnectOptions::new()
					.filename(path)
					.create_if_missing(true),
			)
			.await?;

		let store = Self { pool };
		store.migrate().await?;

		debug!(path = %path.display(), "opened sync queue store");

		Ok(store)
	}

	/// Private in-memory database, for tests and ephemeral sessions.
	pub async fn in_memory() -> Result<Self, Error> {
		// A single connection, otherwise every pool checkout would see its
		// own empty database.
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await?;

		let store = Self { pool };
		store.migrate().await?;

		Ok(store)
	}

	async fn migrate(&self) -> Result<(), Error> {
		// `created_at` is stored as i64 microseconds since epoch; SQLite has
		// no native datetime type.
		sqlx::query(
			"CREATE TABLE IF NOT EXISTS sync_queue (
				id TEXT PRIMARY KEY NOT NULL,
				entity TEXT NOT NULL,
				operation TEXT NOT NULL,
				record_id TEXT,
				data TEXT NOT NULL,
				created_at INTEGER NOT NULL,
				retry_count INTEGER NOT NULL DEFAULT 0,
				last_error TEXT
			)",
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			"CREATE INDEX IF NOT EXISTS idx_sync_queue_entity_operation
				ON sync_queue (entity, operation)",
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			"CREATE INDEX IF NOT EXISTS idx_sync_queue_created_at
				ON sync_queue (created_at)",
		)
		.execute(&self.pool)
		.await?;

		sqlx::query(
			"CREATE TABLE IF NOT EXISTS sync_meta (
				key TEXT PRIMARY KEY NOT NULL,
				value TEXT NOT NULL
			)",
		)
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

#[derive(sqlx::FromRow)]
struct QueueRow {
	id: String,
	entity: String,
	operation: String,
	record_id: Option<String>,
	data: String,
	created_at: i64,
	retry_count: i64,
	last_error: Option<String>,
}

impl QueueRow {
	fn into_item(self) -> Result<SyncQueueItem, Error> {
		let corrupt = |reason: String| Error::CorruptRecord {
			id: self.id.clone(),
			reason,
		};

		Ok(SyncQueueItem {
			id: Uuid::parse_str(&self.id)
				.map_err(|e| corrupt(format!("invalid uuid: {e}")))?,
			table: self
				.entity
				.parse()
				.map_err(|_| corrupt(format!("unknown entity {:?}", self.entity)))?,
			operation: self
				.operation
				.parse()
				.map_err(|_| corrupt(format!("unknown operation {:?}", self.operation)))?,
			data: serde_json::from_str(&self.data)
				.map_err(|e| corrupt(format!("invalid payload: {e}")))?,
			created_at: DateTime::from_timestamp_micros(self.created_at)
				.ok_or_else(|| corrupt(format!("timestamp out of range: {}", self.created_at)))?,
			retry_count: u32::try_from(self.retry_count)
				.map_err(|_| corrupt(format!("negative retry count: {}", self.retry_count)))?,
			record_id: self.record_id,
			last_error: self.last_error,
		})
	}
}

const SELECT_COLUMNS: &str =
	"SELECT id, entity, operation, record_id, data, created_at, retry_count, last_error
		FROM sync_queue";

#[async_trait]
impl QueueStore for SqliteQueueStore {
	async fn put(&self, item: &SyncQueueItem) -> Result<(), Error> {
		sqlx::query(
			"INSERT OR REPLACE INTO sync_queue
				(id, entity, operation, record_id, data, created_at, retry_count, last_error)
				VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(item.id.to_string())
		.bind(item.table.to_string())
		.bind(item.operation.to_string())
		.bind(item.record_id.as_deref())
		.bind(serde_json::to_string(&item.data)?)
		.bind(item.created_at.timestamp_micros())
		.bind(i64::from(item.retry_count))
		.bind(item.last_error.as_deref())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	async fn get(&self, id: Uuid) -> Result<Option<SyncQueueItem>, Error> {
		let sql = format!("{SELECT_COLUMNS} WHERE id = ?");

		sqlx::query_as::<_, QueueRow>(&sql)
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?
			.map(QueueRow::into_item)
			.transpose()
	}

	async fn delete(&self, id: Uuid) -> Result<(), Error> {
		sqlx::query("DELETE FROM sync_queue WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	async fn list(&self, filter: QueueItemFilter) -> Result<Vec<SyncQueueItem>, Error> {
		let mut sql = String::from(SELECT_COLUMNS);

		let mut clauses = Vec::new();
		if filter.table.is_some() {
			clauses.push("entity = ?");
		}
		if filter.operation.is_some() {
			clauses.push("operation = ?");
		}
		if !clauses.is_empty() {
			sql.push_str(" WHERE ");
			sql.push_str(&clauses.join(" AND "));
		}

		// Tie-break on rowid so equal timestamps keep insertion order.
		sql.push_str(" ORDER BY created_at ASC, rowid ASC");

		let mut query = sqlx::query_as::<_, QueueRow>(&sql);
		if let Some(table) = filter.table {
			query = query.bind(table.to_string());
		}
		if let Some(operation) = filter.operation {
			query = query.bind(operation.to_string());
		}

		query
			.fetch_all(&self.pool)
			.await?
			.into_iter()
			.map(QueueRow::into_item)
			.collect()
	}

	async fn clear(&self) -> Result<(), Error> {
		sqlx::query("DELETE FROM sync_queue")
			.execute(&self.pool)
			.await?;
		sqlx::query("DELETE FROM sync_meta")
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	async fn last_success_at(&self) -> Result<Option<DateTime<Utc>>, Error> {
		let value: Option<(String,)> =
			sqlx::query_as("SELECT value FROM sync_meta WHERE key = ?")
				.bind(LAST_SUCCESS_KEY)
				.fetch_optional(&self.pool)
				.await?;

		value
			.map(|(raw,)| {
				raw.parse::<i64>()
					.ok()
					.and_then(DateTime::from_timestamp_micros)
					.ok_or_else(|| Error::CorruptRecord {
						id: LAST_SUCCESS_KEY.to_string(),
						reason: format!("invalid timestamp {raw:?}"),
					})
			})
			.transpose()
	}

	async fn set_last_success_at(&self, at: DateTime<Utc>) -> Result<(), Error> {
		sqlx::query("INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)")
			.bind(LAST_SUCCESS_KEY)
			.bind(at.timestamp_micros().to_string())
			.execute(&self.pool)
			.await?;

		Ok(())
	}
}
