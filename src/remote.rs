//! Boundary contract for the hosted backend.
//!
//! The sync engine never inspects error message text; the remote collaborator
//! reports structured [`RemoteError`] kinds and retry policy is derived from
//! those.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::item::EntityTable;

/// Identifier assigned by the backend on create.
pub type RemoteId = String;

/// Coarse classification of a replay failure, surfaced per item so the UI
/// can distinguish "will retry automatically" from "this change can no
/// longer be applied".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RemoteErrorKind {
	/// Transport-level failure, including per-request timeouts. Retriable.
	Network,
	/// Token expired or rejected. Retriable once the session re-auths.
	Auth,
	/// Target record no longer exists remotely. Not retriable.
	NotFound,
	/// Remote state conflicts with the queued mutation. Not retriable.
	Conflict,
	/// The backend rejected the payload itself. Not retriable.
	Validation,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
	#[error("network failure: {0}")]
	Network(String),
	#[error("authorization failed: {0}")]
	Auth(String),
	#[error("record not found: {0}")]
	NotFound(String),
	#[error("conflicting remote state: {0}")]
	Conflict(String),
	#[error("payload rejected: {0}")]
	Validation(String),
}

impl RemoteError {
	#[must_use]
	pub const fn kind(&self) -> RemoteErrorKind {
		match self {
			Self::Network(_) => RemoteErrorKind::Network,
			Self::Auth(_) => RemoteErrorKind::Auth,
			Self::NotFound(_) => RemoteErrorKind::NotFound,
			Self::Conflict(_) => RemoteErrorKind::Conflict,
			Self::Validation(_) => RemoteErrorKind::Validation,
		}
	}

	/// Whether a later replay attempt can reasonably succeed without the
	/// user changing anything.
	#[must_use]
	pub const fn is_retriable(&self) -> bool {
		matches!(self, Self::Network(_) | Self::Auth(_))
	}
}

/// Request/response operations the backend exposes per `(table, operation)`
/// pair. Implemented over HTTP in production ([`crate::HttpRemoteClient`])
/// and by mocks in tests.
#[async_trait]
pub trait RemoteClient: Send + Sync + 'static {
	async fn create(&self, table: EntityTable, data: &Value) -> Result<RemoteId, RemoteError>;

	async fn update(
		&self,
		table: EntityTable,
		record_id: &str,
		data: &Value,
	) -> Result<(), RemoteError>;

	async fn delete(&self, table: EntityTable, record_id: &str) -> Result<(), RemoteError>;
}
