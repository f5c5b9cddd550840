//! Error taxonomy. Per-item and per-operation failures are isolated by the
//! callers and reported; none of them aborts a whole run.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Principal;

/// Errors surfaced by a storage-provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("provider rejected the request (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures while resolving an item's hierarchical path.
#[derive(Debug, Error)]
pub enum PathError {
    /// The parent chain leaves the caller's own hierarchy; the item does not
    /// belong in the inventory.
    #[error("parent chain breaks at {0}: outside the owned hierarchy")]
    UnresolvableParent(String),

    /// Provider data anomaly: the chain exceeded the configured depth cap.
    #[error("parent chain for {id} exceeds {limit} levels")]
    PathTooDeep { id: String, limit: usize },

    #[error("provider error while resolving {id}: {source}")]
    Provider {
        id: String,
        #[source]
        source: ProviderError,
    },
}

/// Credential-store failures.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Nothing usable on disk: absent, or expired with no refresh path. The
    /// caller must obtain fresh credentials through an authorization flow.
    #[error("no usable credentials at {}", .0.display())]
    NoCredentials(PathBuf),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("malformed credential file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot export/import failures. Row-level problems are collected as
/// skips by the reader, not raised through this type.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected header `{0}`")]
    Header(String),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Failures applying a single mutation.
#[derive(Debug, Error)]
pub enum MutateError {
    /// No live entry matches the principal; the revoke is already satisfied.
    #[error("no live permission matches {principal} on {item_id}")]
    PermissionNotFound { item_id: String, principal: Principal },

    /// The provider refused the insertion, e.g. for a malformed address.
    #[error("grant of {principal} on {item_id} rejected: {reason}")]
    GrantRejected {
        item_id: String,
        principal: Principal,
        reason: String,
    },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}
