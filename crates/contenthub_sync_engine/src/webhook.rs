//! Content Hub webhook handling.

use crate::context::SyncContext;
use crate::error::SyncError;
use crate::import::{ImportCoordinator, ImportMode, ImportReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome reported by Content Hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    /// The operation completed.
    Successful,
    /// The operation is still running.
    Pending,
    /// The operation failed.
    Failed,
    /// Anything else.
    #[serde(other)]
    Unknown,
}

/// Operation the webhook reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crud {
    /// Entities were created.
    Create,
    /// Entities were updated.
    Update,
    /// Entities were deleted.
    Delete,
    /// Anything else.
    #[serde(other)]
    Unknown,
}

/// An entity named by a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAsset {
    /// Entity UUID.
    pub uuid: Uuid,
    /// Entity type.
    #[serde(rename = "type")]
    pub asset_type: String,
}

/// A webhook delivered by Content Hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Operation status.
    pub status: WebhookStatus,
    /// Operation kind.
    pub crud: Crud,
    /// Webhook UUID.
    pub uuid: Uuid,
    /// Entities the operation touched.
    #[serde(default)]
    pub assets: Vec<WebhookAsset>,
    /// Site that started the operation.
    pub initiator: Uuid,
}

impl WebhookPayload {
    /// Decodes a webhook body.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// What was done for one webhook asset.
#[derive(Debug)]
pub enum WebhookAction {
    /// Our export was confirmed; the row moved to `EXPORTED`.
    ExportConfirmed,
    /// A confirmation arrived for an entity with no export row.
    NotTracked,
    /// The remote change was imported.
    Imported(ImportReport),
    /// Importing the remote change failed.
    ImportFailed(SyncError),
    /// Nothing to do.
    Ignored,
}

/// Result for one webhook asset.
#[derive(Debug)]
pub struct WebhookOutcome {
    /// Asset UUID.
    pub uuid: Uuid,
    /// What was done.
    pub action: WebhookAction,
}

/// Dispatches a webhook to export confirmation or automatic import.
pub(crate) fn dispatch(ctx: SyncContext<'_>, payload: &WebhookPayload) -> Vec<WebhookOutcome> {
    let ignore_all = |why: &str| -> Vec<WebhookOutcome> {
        debug!(webhook = %payload.uuid, why, "ignoring webhook");
        payload
            .assets
            .iter()
            .map(|asset| WebhookOutcome {
                uuid: asset.uuid,
                action: WebhookAction::Ignored,
            })
            .collect()
    };

    if payload.status != WebhookStatus::Successful {
        return ignore_all("operation not successful");
    }
    match payload.crud {
        Crud::Create | Crud::Update => {}
        Crud::Delete => {
            if payload.initiator != ctx.origin {
                for asset in &payload.assets {
                    info!(uuid = %asset.uuid, initiator = %payload.initiator, "remote entity deleted");
                }
            }
            return ignore_all("delete");
        }
        Crud::Unknown => return ignore_all("unknown operation"),
    }

    if payload.initiator == ctx.origin {
        return payload
            .assets
            .iter()
            .map(|asset| {
                let action = match ctx.tracker.confirm_export(asset.uuid) {
                    Ok(true) => WebhookAction::ExportConfirmed,
                    Ok(false) => WebhookAction::NotTracked,
                    Err(e) => {
                        warn!(uuid = %asset.uuid, "Could not confirm export of {}: {e}", asset.uuid);
                        WebhookAction::NotTracked
                    }
                };
                WebhookOutcome {
                    uuid: asset.uuid,
                    action,
                }
            })
            .collect();
    }

    let importer = ImportCoordinator::new(ctx);
    payload
        .assets
        .iter()
        .map(|asset| {
            let action = match importer.import_entity(asset.uuid, ImportMode::Automatic) {
                Ok(report) => WebhookAction::Imported(report),
                Err(e) => WebhookAction::ImportFailed(e),
            };
            WebhookOutcome {
                uuid: asset.uuid,
                action,
            }
        })
        .collect()
}
