use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerline_sync::{
	item::QueueItemFilter, ConnectivityHandle, EntityTable, Error, QueueManager, QueueStore,
	RemoteClient, RemoteError, RemoteId, SqliteQueueStore, SyncConfig, SyncManager,
	SyncQueueItem, SyncStateStore,
};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
	pub table: EntityTable,
	pub operation: &'static str,
	pub record_id: Option<String>,
}

/// Programmable stand-in for the hosted backend.
///
/// Outcomes are consumed from `script` in call order; once the script is
/// exhausted, calls fall back to `default_outcome` (success unless changed).
#[derive(Default)]
pub struct MockRemote {
	calls: Mutex<Vec<RemoteCall>>,
	script: Mutex<VecDeque<Result<(), RemoteError>>>,
	create_ids: Mutex<VecDeque<String>>,
	default_outcome: Mutex<Option<RemoteError>>,
	next_id: AtomicUsize,
	delay: Mutex<Option<Duration>>,
}

impl MockRemote {
	pub fn script(&self, outcomes: impl IntoIterator<Item = Result<(), RemoteError>>) {
		self.script.lock().unwrap().extend(outcomes);
	}

	pub fn fail_always(&self, error: RemoteError) {
		*self.default_outcome.lock().unwrap() = Some(error);
	}

	pub fn succeed_always(&self) {
		*self.default_outcome.lock().unwrap() = None;
	}

	pub fn push_create_id(&self, id: &str) {
		self.create_ids.lock().unwrap().push_back(id.to_string());
	}

	pub fn set_delay(&self, delay: Duration) {
		*self.delay.lock().unwrap() = Some(delay);
	}

	pub fn calls(&self) -> Vec<RemoteCall> {
		self.calls.lock().unwrap().clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap().len()
	}

	async fn outcome(
		&self,
		table: EntityTable,
		operation: &'static str,
		record_id: Option<&str>,
	) -> Result<(), RemoteError> {
		self.calls.lock().unwrap().push(RemoteCall {
			table,
			operation,
			record_id: record_id.map(ToString::to_string),
		});

		let delay = *self.delay.lock().unwrap();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		let scripted = self.script.lock().unwrap().pop_front();
		match scripted {
			Some(outcome) => outcome,
			None => match self.default_outcome.lock().unwrap().clone() {
				Some(error) => Err(error),
				None => Ok(()),
			},
		}
	}
}

#[async_trait]
impl RemoteClient for MockRemote {
	async fn create(&self, table: EntityTable, _data: &Value) -> Result<RemoteId, RemoteError> {
		self.outcome(table, "create", None).await?;

		let scripted = self.create_ids.lock().unwrap().pop_front();
		Ok(scripted
			.unwrap_or_else(|| format!("rem-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)))
	}

	async fn update(
		&self,
		table: EntityTable,
		record_id: &str,
		_data: &Value,
	) -> Result<(), RemoteError> {
		self.outcome(table, "update", Some(record_id)).await
	}

	async fn delete(&self, table: EntityTable, record_id: &str) -> Result<(), RemoteError> {
		self.outcome(table, "delete", Some(record_id)).await
	}
}

/// Store wrapper that can be told to fail its next operation, for the
/// storage-error propagation paths.
pub struct FlakyStore {
	inner: SqliteQueueStore,
	fail_next_list: AtomicBool,
	fail_next_put: AtomicBool,
}

impl FlakyStore {
	pub async fn new() -> Self {
		Self {
			inner: SqliteQueueStore::in_memory().await.unwrap(),
			fail_next_list: AtomicBool::new(false),
			fail_next_put: AtomicBool::new(false),
		}
	}

	pub fn fail_next_list(&self) {
		self.fail_next_list.store(true, Ordering::SeqCst);
	}

	pub fn fail_next_put(&self) {
		self.fail_next_put.store(true, Ordering::SeqCst);
	}

	fn induced_failure() -> Error {
		Error::CorruptRecord {
			id: "induced".to_string(),
			reason: "induced storage failure".to_string(),
		}
	}
}

#[async_trait]
impl QueueStore for FlakyStore {
	async fn put(&self, item: &SyncQueueItem) -> Result<(), Error> {
		if self.fail_next_put.swap(false, Ordering::SeqCst) {
			return Err(Self::induced_failure());
		}

		self.inner.put(item).await
	}

	async fn get(&self, id: Uuid) -> Result<Option<SyncQueueItem>, Error> {
		self.inner.get(id).await
	}

	async fn delete(&self, id: Uuid) -> Result<(), Error> {
		self.inner.delete(id).await
	}

	async fn list(&self, filter: QueueItemFilter) -> Result<Vec<SyncQueueItem>, Error> {
		if self.fail_next_list.swap(false, Ordering::SeqCst) {
			return Err(Self::induced_failure());
		}

		self.inner.list(filter).await
	}

	async fn clear(&self) -> Result<(), Error> {
		self.inner.clear().await
	}

	async fn last_success_at(&self) -> Result<Option<DateTime<Utc>>, Error> {
		self.inner.last_success_at().await
	}

	async fn set_last_success_at(&self, at: DateTime<Utc>) -> Result<(), Error> {
		self.inner.set_last_success_at(at).await
	}
}

pub struct Harness {
	pub manager: Arc<SyncManager>,
	pub remote: Arc<MockRemote>,
	pub connectivity: ConnectivityHandle,
	pub online_rx: watch::Receiver<bool>,
}

pub async fn harness(online: bool) -> Harness {
	let config = SyncConfig {
		status_linger: Duration::from_millis(50),
		..Default::default()
	};

	harness_with(
		config,
		online,
		Arc::new(SqliteQueueStore::in_memory().await.unwrap()),
	)
	.await
}

pub async fn harness_with(
	config: SyncConfig,
	online: bool,
	store: Arc<dyn QueueStore>,
) -> Harness {
	let (connectivity, online_rx) = ledgerline_sync::connectivity::channel(online);

	let queue = QueueManager::with_max_retries(store, config.max_retries);
	let state = Arc::new(SyncStateStore::new(online));
	let remote = Arc::new(MockRemote::default());

	let remote_client: Arc<dyn RemoteClient> = Arc::clone(&remote) as Arc<dyn RemoteClient>;
	let manager = Arc::new(SyncManager::new(queue, remote_client, state, &config));

	Harness {
		manager,
		remote,
		connectivity,
		online_rx,
	}
}
