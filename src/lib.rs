#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Offline sync engine for the Ledgerline personal finance app.
//!
//! Local mutations made while offline are written to a durable queue
//! ([`QueueManager`] over a [`QueueStore`]) and replayed against the remote
//! backend by the [`SyncManager`] once connectivity returns. Observable sync
//! state lives in a [`SyncStateStore`] that the UI subscribes to.

pub mod config;
pub mod connectivity;
pub mod http;
pub mod item;
pub mod manager;
pub mod queue;
pub mod remote;
pub mod state;
pub mod store;

pub use config::SyncConfig;
pub use connectivity::ConnectivityHandle;
pub use http::{AccessTokenProvider, HttpRemoteClient, StaticTokenProvider};
pub use item::{EntityTable, QueueItemFilter, SyncOperation, SyncQueueItem};
pub use manager::SyncManager;
pub use queue::{QueueManager, QueueStatus, DEFAULT_MAX_RETRIES};
pub use remote::{RemoteClient, RemoteError, RemoteErrorKind, RemoteId};
pub use state::{CreatedRecord, SyncItemError, SyncResult, SyncState, SyncStateStore, SyncStatus};
pub use store::{QueueStore, SqliteQueueStore};

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
	#[error("http client error: {0}")]
	Http(#[from] reqwest::Error),
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
	#[error("corrupt queue record <id={id}>: {reason}")]
	CorruptRecord { id: String, reason: String },
	#[error("a sync run is already in progress")]
	SyncAlreadyRunning,
	#[error("cannot sync while offline")]
	Offline,
}
