//! Connectivity signal boundary.
//!
//! The host's network monitor owns the [`ConnectivityHandle`]; the engine
//! subscribes to the paired watch receiver and reacts to offline/online
//! transitions (see [`crate::SyncManager::spawn_auto_sync`]).

use tokio::sync::watch;

pub struct ConnectivityHandle {
	tx: watch::Sender<bool>,
}

impl ConnectivityHandle {
	pub fn set_online(&self, online: bool) {
		// Only transitions are interesting downstream.
		self.tx.send_if_modified(|current| {
			if *current == online {
				false
			} else {
				*current = online;
				true
			}
		});
	}

	#[must_use]
	pub fn is_online(&self) -> bool {
		*self.tx.borrow()
	}

	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<bool> {
		self.tx.subscribe()
	}
}

/// Create the connectivity channel, seeded from the runtime's current
/// online/offline signal.
#[must_use]
pub fn channel(initially_online: bool) -> (ConnectivityHandle, watch::Receiver<bool>) {
	let (tx, rx) = watch::channel(initially_online);
	(ConnectivityHandle { tx }, rx)
}
