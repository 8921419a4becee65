//! Process-wide observable sync state.
//!
//! A plain state container over a watch channel: no business logic lives
//! here. The [`crate::SyncManager`] and the connectivity observer are the
//! only writers (the mutators are crate-private); UI observers hold a
//! [`tokio::sync::watch::Receiver`] from [`SyncStateStore::subscribe`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
	item::{EntityTable, SyncOperation},
	remote::RemoteErrorKind,
};

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncStatus {
	#[default]
	Idle,
	Syncing,
	Success,
	Error,
}

/// One failed item from a sync run, with its structured error kind so the
/// UI can tell retriable failures apart from dead ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItemError {
	pub item_id: Uuid,
	pub table: EntityTable,
	pub operation: SyncOperation,
	pub kind: RemoteErrorKind,
	pub message: String,
}

/// `(queue item, remote id)` pair produced by a successful create, so the
/// caller's cache layer can reconcile its optimistic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
	pub item_id: Uuid,
	pub table: EntityTable,
	pub remote_id: String,
}

/// Aggregate outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncResult {
	pub success: usize,
	pub failed: usize,
	pub total: usize,
	pub errors: Vec<SyncItemError>,
	pub created_records: Vec<CreatedRecord>,
}

/// Snapshot consumed by UI observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
	pub is_online: bool,
	pub is_syncing: bool,
	pub status: SyncStatus,
	pub last_sync_time: Option<DateTime<Utc>>,
	pub pending_operations: usize,
	pub last_sync_result: Option<SyncResult>,
}

impl SyncState {
	#[must_use]
	pub fn initial(is_online: bool) -> Self {
		Self {
			is_online,
			is_syncing: false,
			status: SyncStatus::Idle,
			last_sync_time: None,
			pending_operations: 0,
			last_sync_result: None,
		}
	}
}

pub struct SyncStateStore {
	tx: watch::Sender<SyncState>,
}

impl SyncStateStore {
	#[must_use]
	pub fn new(initially_online: bool) -> Self {
		let (tx, _) = watch::channel(SyncState::initial(initially_online));
		Self { tx }
	}

	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<SyncState> {
		self.tx.subscribe()
	}

	#[must_use]
	pub fn get(&self) -> SyncState {
		self.tx.borrow().clone()
	}

	pub(crate) fn set_online(&self, online: bool) {
		self.tx.send_modify(|state| state.is_online = online);
	}

	pub(crate) fn set_pending(&self, pending: usize) {
		self.tx.send_modify(|state| state.pending_operations = pending);
	}

	pub(crate) fn begin_run(&self, pending: usize) {
		self.tx.send_modify(|state| {
			state.is_syncing = true;
			state.status = SyncStatus::Syncing;
			state.pending_operations = pending;
		});
	}

	pub(crate) fn finish_run(&self, result: SyncResult, pending_left: usize) {
		self.tx.send_modify(|state| {
			state.is_syncing = false;
			state.status = if result.failed == 0 {
				SyncStatus::Success
			} else {
				SyncStatus::Error
			};
			state.last_sync_time = Some(Utc::now());
			state.pending_operations = pending_left;
			state.last_sync_result = Some(result);
		});
	}

	/// A run died on a storage error before reaching its result.
	pub(crate) fn abort_run(&self) {
		self.tx.send_modify(|state| {
			state.is_syncing = false;
			state.status = SyncStatus::Error;
		});
	}

	/// Let a terminal success/error status fall back to idle once its
	/// display window is over. No-op while a run is active.
	pub(crate) fn settle(&self) {
		self.tx.send_if_modified(|state| {
			if state.is_syncing || state.status == SyncStatus::Idle {
				false
			} else {
				state.status = SyncStatus::Idle;
				true
			}
		});
	}

	/// Back to the initial idle state (logout path). Connectivity is a fact
	/// about the runtime, not the session, so `is_online` survives.
	pub(crate) fn reset(&self) {
		self.tx.send_modify(|state| {
			*state = SyncState::initial(state.is_online);
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn observers_see_run_lifecycle() {
		let store = SyncStateStore::new(true);
		let mut rx = store.subscribe();

		store.begin_run(3);
		rx.changed().await.unwrap();
		{
			let state = rx.borrow();
			assert!(state.is_syncing);
			assert_eq!(state.status, SyncStatus::Syncing);
			assert_eq!(state.pending_operations, 3);
		}

		store.finish_run(
			SyncResult {
				success: 2,
				failed: 1,
				total: 3,
				..Default::default()
			},
			1,
		);
		rx.changed().await.unwrap();
		let state = rx.borrow().clone();
		assert!(!state.is_syncing);
		assert_eq!(state.status, SyncStatus::Error);
		assert_eq!(state.pending_operations, 1);
		assert!(state.last_sync_time.is_some());
	}

	#[test]
	fn settle_only_touches_terminal_states() {
		let store = SyncStateStore::new(true);

		store.settle();
		assert_eq!(store.get().status, SyncStatus::Idle);

		store.begin_run(1);
		store.settle();
		assert_eq!(store.get().status, SyncStatus::Syncing);

		store.finish_run(SyncResult::default(), 0);
		store.settle();
		assert_eq!(store.get().status, SyncStatus::Idle);
	}

	#[test]
	fn reset_keeps_connectivity() {
		let store = SyncStateStore::new(false);
		store.set_online(true);
		store.finish_run(SyncResult::default(), 0);

		store.reset();

		let state = store.get();
		assert_eq!(state, SyncState::initial(true));
	}
}
