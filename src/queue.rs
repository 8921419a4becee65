//! Queue semantics on top of the durable store.
//!
//! The [`QueueManager`] is the only reader/writer of the [`QueueStore`];
//! everything else in the engine (and in the host app) goes through it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{
	item::{EntityTable, QueueItemFilter, SyncOperation, SyncQueueItem},
	store::QueueStore,
	Error,
};

/// Failed replay attempts after which an item counts as failed rather than
/// pending. Failed items stay in the queue but are excluded from automatic
/// replay, so a persistently rejected mutation cannot cause a retry storm.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Read-only snapshot derived from the store on demand; never persisted
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
	pub total: usize,
	pub pending: usize,
	pub failed: usize,
	pub last_success_at: Option<DateTime<Utc>>,
}

pub struct QueueManager {
	store: Arc<dyn QueueStore>,
	max_retries: u32,
}

impl QueueManager {
	pub fn new(store: Arc<dyn QueueStore>) -> Self {
		Self::with_max_retries(store, DEFAULT_MAX_RETRIES)
	}

	pub fn with_max_retries(store: Arc<dyn QueueStore>, max_retries: u32) -> Self {
		Self { store, max_retries }
	}

	/// Persist a new mutation and return its queue id.
	///
	/// Storage errors propagate: a mutation that could not be queued is lost
	/// and the caller must surface that immediately rather than pretend it
	/// will sync later.
	pub async fn enqueue(
		&self,
		table: EntityTable,
		operation: SyncOperation,
		record_id: Option<String>,
		data: Value,
	) -> Result<Uuid, Error> {
		let item = SyncQueueItem::new(table, operation, record_id, data);
		self.store.put(&item).await?;

		debug!(id = %item.id, %table, %operation, "queued offline mutation");

		Ok(item.id)
	}

	pub async fn get(&self, id: Uuid) -> Result<Option<SyncQueueItem>, Error> {
		self.store.get(id).await
	}

	/// Remove an item after its replay was confirmed. Idempotent.
	pub async fn dequeue(&self, id: Uuid) -> Result<(), Error> {
		self.store.delete(id).await
	}

	/// Record one failed replay attempt. The item stays queued;
	/// `retry_count` only ever increases until the item is removed.
	pub async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), Error> {
		let Some(mut item) = self.store.get(id).await? else {
			debug!(%id, "mark_failed on unknown item, ignoring");
			return Ok(());
		};

		item.retry_count += 1;
		item.last_error = Some(message.to_string());

		self.store.put(&item).await
	}

	/// Items eligible for replay, oldest first, optionally scoped to one
	/// table. Items at or past the retry threshold are excluded.
	pub async fn get_pending(
		&self,
		table: Option<EntityTable>,
	) -> Result<Vec<SyncQueueItem>, Error> {
		let mut items = self
			.store
			.list(QueueItemFilter {
				table,
				operation: None,
			})
			.await?;

		items.retain(|item| item.retry_count < self.max_retries);

		Ok(items)
	}

	/// Items past the retry threshold, oldest first. These are only replayed
	/// again on an explicit user request.
	pub async fn get_failed(&self) -> Result<Vec<SyncQueueItem>, Error> {
		let mut items = self.store.list(QueueItemFilter::default()).await?;
		items.retain(|item| item.retry_count >= self.max_retries);

		Ok(items)
	}

	pub async fn status(&self) -> Result<QueueStatus, Error> {
		let items = self.store.list(QueueItemFilter::default()).await?;
		let failed = items
			.iter()
			.filter(|item| item.retry_count >= self.max_retries)
			.count();

		Ok(QueueStatus {
			total: items.len(),
			pending: items.len() - failed,
			failed,
			last_success_at: self.store.last_success_at().await?,
		})
	}

	pub(crate) async fn record_success_time(&self, at: DateTime<Utc>) -> Result<(), Error> {
		self.store.set_last_success_at(at).await
	}

	/// Empty the queue and its metadata (logout path).
	pub async fn clear(&self) -> Result<(), Error> {
		self.store.clear().await
	}
}
