//! Data model for queued offline mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// The logical entities a mutation can target. Closed set, mirrors the
/// remote schema.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityTable {
	Transactions,
	Categories,
	Accounts,
}

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncOperation {
	Create,
	Update,
	Delete,
}

/// One pending local mutation awaiting confirmation against the remote
/// backend.
///
/// The `id` is assigned at enqueue time and stays stable across retries. An
/// item leaves the queue only after the remote operation is confirmed, or on
/// an explicit cache clear (logout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueItem {
	pub id: Uuid,
	pub table: EntityTable,
	pub operation: SyncOperation,
	/// Identifier of the target remote record. `None` for `create`, where
	/// the remote id is not yet known.
	pub record_id: Option<String>,
	/// Full record for create/update; may be empty for delete.
	pub data: Value,
	pub created_at: DateTime<Utc>,
	pub retry_count: u32,
	pub last_error: Option<String>,
}

impl SyncQueueItem {
	pub fn new(
		table: EntityTable,
		operation: SyncOperation,
		record_id: Option<String>,
		data: Value,
	) -> Self {
		Self {
			id: Uuid::new_v4(),
			table,
			operation,
			record_id,
			data,
			created_at: Utc::now(),
			retry_count: 0,
			last_error: None,
		}
	}
}

/// Optional narrowing for [`crate::QueueStore::list`]. Both fields combined
/// hit the store's composite `(entity, operation)` index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueItemFilter {
	pub table: Option<EntityTable>,
	pub operation: Option<SyncOperation>,
}

impl QueueItemFilter {
	#[must_use]
	pub const fn table(table: EntityTable) -> Self {
		Self {
			table: Some(table),
			operation: None,
		}
	}
}
