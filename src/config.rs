//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::DEFAULT_MAX_RETRIES;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	/// Base URL of the hosted backend's data API.
	pub backend_url: String,
	/// Failed replay attempts before an item is reported as failed and
	/// dropped from automatic replay.
	pub max_retries: u32,
	/// Per-request timeout for remote calls. A timed-out call counts as a
	/// network failure for the affected item; the sync run itself has no
	/// separate timeout.
	pub request_timeout: Duration,
	/// How long a terminal success/error status stays visible before the
	/// state settles back to idle.
	pub status_linger: Duration,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			backend_url: "https://api.ledgerline.app".to_string(),
			max_retries: DEFAULT_MAX_RETRIES,
			request_timeout: Duration::from_secs(15),
			status_linger: Duration::from_secs(3),
		}
	}
}
