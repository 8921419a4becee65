//! Orchestrates draining the queue against the remote backend.
//!
//! One [`SyncManager`] per process. A run replays the pending set as of its
//! start in global `created_at` order, applies per-item success/failure
//! policy, and publishes the outcome to the [`SyncStateStore`]. Runs are
//! mutually exclusive; a run is never cancelled mid-flight.

use std::{
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc,
	},
	time::Duration,
};

use chrono::Utc;
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
	config::SyncConfig,
	item::{EntityTable, SyncOperation, SyncQueueItem},
	queue::QueueManager,
	remote::{RemoteClient, RemoteError, RemoteId},
	state::{CreatedRecord, SyncItemError, SyncResult, SyncStateStore},
	Error,
};

enum ReplayScope {
	/// Items below the retry threshold; the normal automatic path.
	Pending,
	/// Items at or past the threshold, replayed only on explicit request.
	Failed,
}

pub struct SyncManager {
	queue: QueueManager,
	remote: Arc<dyn RemoteClient>,
	state: Arc<SyncStateStore>,
	// The only concurrency guard in the engine; checked synchronously before
	// any queue access so overlapping runs are rejected without side effects.
	syncing: AtomicBool,
	run_counter: Arc<AtomicU64>,
	status_linger: Duration,
}

impl SyncManager {
	pub fn new(
		queue: QueueManager,
		remote: Arc<dyn RemoteClient>,
		state: Arc<SyncStateStore>,
		config: &SyncConfig,
	) -> Self {
		Self {
			queue,
			remote,
			state,
			syncing: AtomicBool::new(false),
			run_counter: Arc::new(AtomicU64::new(0)),
			status_linger: config.status_linger,
		}
	}

	#[must_use]
	pub const fn queue(&self) -> &QueueManager {
		&self.queue
	}

	#[must_use]
	pub fn state(&self) -> &SyncStateStore {
		&self.state
	}

	/// Record a local mutation for later replay and refresh the observable
	/// pending count.
	pub async fn enqueue(
		&self,
		table: EntityTable,
		operation: SyncOperation,
		record_id: Option<String>,
		data: Value,
	) -> Result<Uuid, Error> {
		let id = self.queue.enqueue(table, operation, record_id, data).await?;
		self.state.set_pending(self.queue.status().await?.pending);

		Ok(id)
	}

	/// Drain the pending set against the remote backend.
	///
	/// Rejects synchronously with [`Error::Offline`] or
	/// [`Error::SyncAlreadyRunning`] before touching the queue. Per-item
	/// failures never abort the run; storage errors do.
	pub async fn sync_all(&self) -> Result<SyncResult, Error> {
		self.run(ReplayScope::Pending).await
	}

	/// Manual trigger wired to the UI's sync button. Same contract as
	/// [`Self::sync_all`].
	pub async fn sync_now(&self) -> Result<SyncResult, Error> {
		self.sync_all().await
	}

	/// Replay items that already hit the retry threshold. Only ever runs on
	/// explicit user action; their retry counts keep rising on failure.
	pub async fn retry_failed(&self) -> Result<SyncResult, Error> {
		self.run(ReplayScope::Failed).await
	}

	/// Synchronously empty the durable queue and reset the observable state.
	/// Called by the logout flow before remote sign-out so the next session
	/// cannot observe this user's queued operations.
	pub async fn clear_all_cache(&self) -> Result<(), Error> {
		self.queue.clear().await?;
		self.state.reset();

		info!("cleared sync queue and state");

		Ok(())
	}

	/// Watch the connectivity signal; on an offline-to-online transition
	/// with pending items, drain the queue. Also mirrors the signal into the
	/// state store for observers.
	pub fn spawn_auto_sync(
		self: &Arc<Self>,
		mut online_rx: watch::Receiver<bool>,
	) -> JoinHandle<()> {
		let manager = Arc::clone(self);

		tokio::spawn(async move {
			let mut was_online = *online_rx.borrow();
			manager.state.set_online(was_online);

			while online_rx.changed().await.is_ok() {
				let online = *online_rx.borrow();
				manager.state.set_online(online);

				if online && !was_online {
					match manager.queue.status().await {
						Ok(status) if status.pending > 0 => {
							info!(pending = status.pending, "back online, draining sync queue");

							if let Err(e) = manager.sync_all().await {
								warn!("auto sync failed: {e}");
							}
						}
						Ok(_) => debug!("back online, queue empty"),
						Err(e) => error!("failed to read queue status: {e}"),
					}
				}

				was_online = online;
			}
		})
	}

	async fn run(&self, scope: ReplayScope) -> Result<SyncResult, Error> {
		if !self.state.get().is_online {
			return Err(Error::Offline);
		}

		if self
			.syncing
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return Err(Error::SyncAlreadyRunning);
		}

		let run = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
		let outcome = self.drain(scope).await;
		self.syncing.store(false, Ordering::SeqCst);

		match outcome {
			Ok(result) => {
				self.schedule_settle(run);
				Ok(result)
			}
			Err(e) => {
				self.state.abort_run();
				self.schedule_settle(run);
				Err(e)
			}
		}
	}

	async fn drain(&self, scope: ReplayScope) -> Result<SyncResult, Error> {
		let items = match scope {
			ReplayScope::Pending => self.queue.get_pending(None).await?,
			ReplayScope::Failed => self.queue.get_failed().await?,
		};

		self.state.begin_run(items.len());
		info!(total = items.len(), "starting sync run");

		let mut result = SyncResult {
			total: items.len(),
			..Default::default()
		};

		for item in items {
			match self.replay(&item).await {
				Ok(created) => {
					self.queue.dequeue(item.id).await?;

					if let Some(remote_id) = created {
						result.created_records.push(CreatedRecord {
							item_id: item.id,
							table: item.table,
							remote_id,
						});
					}

					result.success += 1;
				}
				Err(e) => {
					warn!(
						id = %item.id,
						kind = %e.kind(),
						retriable = e.is_retriable(),
						"replay failed: {e}"
					);

					self.queue.mark_failed(item.id, &e.to_string()).await?;

					result.failed += 1;
					result.errors.push(SyncItemError {
						item_id: item.id,
						table: item.table,
						operation: item.operation,
						kind: e.kind(),
						message: e.to_string(),
					});
				}
			}
		}

		if result.success > 0 {
			self.queue.record_success_time(Utc::now()).await?;
		}

		let pending_left = self.queue.status().await?.pending;

		info!(
			success = result.success,
			failed = result.failed,
			pending_left,
			"sync run finished"
		);

		self.state.finish_run(result.clone(), pending_left);

		Ok(result)
	}

	async fn replay(&self, item: &SyncQueueItem) -> Result<Option<RemoteId>, RemoteError> {
		debug!(
			id = %item.id,
			table = %item.table,
			operation = %item.operation,
			attempt = item.retry_count + 1,
			"replaying queued mutation"
		);

		match item.operation {
			SyncOperation::Create => self.remote.create(item.table, &item.data).await.map(Some),
			SyncOperation::Update => {
				let record_id = require_record_id(item)?;
				self.remote
					.update(item.table, record_id, &item.data)
					.await
					.map(|()| None)
			}
			SyncOperation::Delete => {
				let record_id = require_record_id(item)?;
				self.remote
					.delete(item.table, record_id)
					.await
					.map(|()| None)
			}
		}
	}

	/// Let the terminal status fall back to idle after the display window,
	/// unless another run has started in the meantime.
	fn schedule_settle(&self, run: u64) {
		let state = Arc::clone(&self.state);
		let counter = Arc::clone(&self.run_counter);
		let linger = self.status_linger;

		tokio::spawn(async move {
			sleep(linger).await;

			if counter.load(Ordering::SeqCst) == run {
				state.settle();
			}
		});
	}
}

fn require_record_id(item: &SyncQueueItem) -> Result<&str, RemoteError> {
	item.record_id.as_deref().ok_or_else(|| {
		RemoteError::Validation(format!("{} item without record id", item.operation))
	})
}
