//! Error types for the sync engine.

use thiserror::Error;
use uuid::Uuid;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failure class of a Content Hub request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not connect.
    Connect,
    /// The request timed out.
    Timeout,
    /// The service answered with a 4xx status.
    Client(u16),
    /// The service answered with a 5xx status.
    Server(u16),
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or invalid connection settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A Content Hub request failed.
    #[error("transport error ({kind:?}): {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Failure class.
        kind: TransportErrorKind,
    },

    /// A local field could not be mapped to a CDF attribute.
    #[error("cannot map field '{field}' of {entity}: {message}")]
    Mapping {
        /// Entity description (`type/bundle uuid`).
        entity: String,
        /// Field name.
        field: String,
        /// What went wrong.
        message: String,
    },

    /// A CDF record could not be turned into a local entity.
    #[error("cannot denormalize {uuid}: {message}")]
    Denormalize {
        /// Record UUID.
        uuid: Uuid,
        /// What went wrong.
        message: String,
    },

    /// Importing an entity this site authored.
    #[error("entity {uuid} originates from this site and cannot be imported")]
    SelfOrigin {
        /// Record UUID.
        uuid: Uuid,
    },

    /// The remote entity does not exist.
    #[error("remote entity {uuid} not found")]
    NotFound {
        /// Requested UUID.
        uuid: Uuid,
    },

    /// The entity may not be published from this site.
    #[error("entity {uuid} cannot be exported: {reason}")]
    NotExportable {
        /// Entity UUID.
        uuid: Uuid,
        /// Why it was refused.
        reason: String,
    },

    /// The local entity store rejected an operation.
    #[error("local store error: {0}")]
    LocalStore(String),

    /// CDF record error.
    #[error("cdf error: {0}")]
    Cdf(#[from] contenthub_cdf::CdfError),

    /// Sync state persistence error.
    #[error("state error: {0}")]
    State(#[from] contenthub_state::StateError),
}

impl SyncError {
    /// Creates a transport error.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            kind,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a local store error.
    pub fn local_store(message: impl Into<String>) -> Self {
        Self::LocalStore(message.into())
    }

    /// Creates a not-exportable error.
    pub fn not_exportable(uuid: Uuid, reason: impl Into<String>) -> Self {
        Self::NotExportable {
            uuid,
            reason: reason.into(),
        }
    }

    /// Creates a denormalization error.
    pub fn denormalize(uuid: Uuid, message: impl Into<String>) -> Self {
        Self::Denormalize {
            uuid,
            message: message.into(),
        }
    }

    /// Returns true if a later attempt could succeed.
    ///
    /// Informational only: the coordinators never retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { kind, .. } => matches!(
                kind,
                TransportErrorKind::Connect
                    | TransportErrorKind::Timeout
                    | TransportErrorKind::Server(_)
            ),
            _ => false,
        }
    }

    /// Returns the HTTP-equivalent status for synchronous callers.
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::SelfOrigin { .. } => 403,
            SyncError::NotFound { .. } => 404,
            SyncError::NotExportable { .. } => 409,
            SyncError::Denormalize { .. } | SyncError::Cdf(_) => 400,
            SyncError::Mapping { .. } => 422,
            SyncError::Transport { kind, .. } => match kind {
                TransportErrorKind::Timeout => 504,
                _ => 502,
            },
            SyncError::Configuration(_) | SyncError::LocalStore(_) | SyncError::State(_) => 500,
        }
    }
}
