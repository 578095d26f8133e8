//! Remote Content Hub seam.

use crate::error::{SyncError, SyncResult, TransportErrorKind};
use contenthub_cdf::{BaseType, CdfDocument, CdfRecord};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A CDF document and the URL it is served from.
///
/// Content Hub pulls the document from `url`; the document is carried
/// along so in-process gateways do not need to fetch it.
#[derive(Debug, Clone)]
pub struct ExportResource {
    /// Resource URL on this site.
    pub url: String,
    /// Records to publish.
    pub document: CdfDocument,
}

impl ExportResource {
    /// Creates a resource.
    pub fn new(url: impl Into<String>, document: CdfDocument) -> Self {
        Self {
            url: url.into(),
            document,
        }
    }
}

/// Filters for [`RemoteGateway::list_entities`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Only records of this type.
    pub record_type: Option<String>,
    /// Only records authored by this site.
    pub origin: Option<Uuid>,
    /// Records to skip.
    pub start: usize,
    /// Maximum records returned. `0` means no limit.
    pub limit: usize,
}

/// A search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Record UUID.
    pub uuid: Uuid,
    /// Record type.
    pub record_type: String,
    /// Authoring site.
    pub origin: Uuid,
}

/// Operations the sync core needs from Content Hub.
///
/// Implementations surface failures as [`SyncError::Transport`]. They
/// must not retry; retry policy belongs to the caller.
pub trait RemoteGateway: Send + Sync {
    /// Publishes a batch of records for the first time.
    fn create_entities(&self, resource: &ExportResource) -> SyncResult<()>;

    /// Publishes a new version of an already exported entity.
    fn update_entity(&self, resource: &ExportResource, uuid: Uuid) -> SyncResult<()>;

    /// Removes an entity from Content Hub.
    fn delete_entity(&self, uuid: Uuid) -> SyncResult<()>;

    /// Fetches a record. `Ok(None)` if Content Hub does not have it.
    fn read_entity(&self, uuid: Uuid) -> SyncResult<Option<CdfRecord>>;

    /// Lists records.
    fn list_entities(&self, options: &ListOptions) -> SyncResult<Vec<CdfRecord>>;

    /// Full-text search over string attributes.
    fn search_entity(&self, query: &str) -> SyncResult<Vec<SearchHit>>;
}

/// A call observed by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `create_entities` with the batch UUIDs.
    Create(Vec<Uuid>),
    /// `update_entity` with the root UUID and the batch UUIDs.
    Update(Uuid, Vec<Uuid>),
    /// `delete_entity`.
    Delete(Uuid),
    /// `read_entity`.
    Read(Uuid),
    /// `list_entities`.
    List,
    /// `search_entity`.
    Search(String),
}

/// In-memory Content Hub.
///
/// Stores published records by UUID and logs every call. A failure can
/// be scheduled for the next call with [`fail_next`](Self::fail_next).
#[derive(Debug, Default)]
pub struct MemoryGateway {
    records: RwLock<BTreeMap<Uuid, CdfRecord>>,
    calls: RwLock<Vec<GatewayCall>>,
    fail_next: Mutex<Option<TransportErrorKind>>,
}

impl MemoryGateway {
    /// Creates an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a record as if another site had published it.
    pub fn insert(&self, record: CdfRecord) {
        self.records.write().insert(record.uuid(), record);
    }

    /// Adds every record of a document.
    pub fn insert_document(&self, document: CdfDocument) {
        let mut records = self.records.write();
        for record in document.entities {
            records.insert(record.uuid(), record);
        }
    }

    /// Returns a published record.
    pub fn record(&self, uuid: Uuid) -> Option<CdfRecord> {
        self.records.read().get(&uuid).cloned()
    }

    /// Returns the number of published records.
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Makes the next call fail with `kind`.
    pub fn fail_next(&self, kind: TransportErrorKind) {
        *self.fail_next.lock() = Some(kind);
    }

    /// Returns the calls made so far.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.read().clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    fn begin(&self, call: GatewayCall) -> SyncResult<()> {
        let description = format!("{call:?}");
        self.calls.write().push(call);
        match self.fail_next.lock().take() {
            Some(kind) => Err(SyncError::transport(
                kind,
                format!("scheduled failure of {description}"),
            )),
            None => Ok(()),
        }
    }

    fn publish(&self, document: &CdfDocument) {
        let mut records = self.records.write();
        for record in &document.entities {
            records.insert(record.uuid(), record.clone());
        }
    }
}

impl RemoteGateway for MemoryGateway {
    fn create_entities(&self, resource: &ExportResource) -> SyncResult<()> {
        self.begin(GatewayCall::Create(resource.document.uuids()))?;
        self.publish(&resource.document);
        Ok(())
    }

    fn update_entity(&self, resource: &ExportResource, uuid: Uuid) -> SyncResult<()> {
        self.begin(GatewayCall::Update(uuid, resource.document.uuids()))?;
        self.publish(&resource.document);
        Ok(())
    }

    fn delete_entity(&self, uuid: Uuid) -> SyncResult<()> {
        self.begin(GatewayCall::Delete(uuid))?;
        self.records.write().remove(&uuid);
        Ok(())
    }

    fn read_entity(&self, uuid: Uuid) -> SyncResult<Option<CdfRecord>> {
        self.begin(GatewayCall::Read(uuid))?;
        Ok(self.record(uuid))
    }

    fn list_entities(&self, options: &ListOptions) -> SyncResult<Vec<CdfRecord>> {
        self.begin(GatewayCall::List)?;
        let records = self.records.read();
        let matching = records
            .values()
            .filter(|r| {
                options
                    .record_type
                    .as_deref()
                    .map_or(true, |t| r.record_type() == t)
            })
            .filter(|r| options.origin.map_or(true, |o| r.origin() == o))
            .skip(options.start);
        let limit = if options.limit == 0 {
            usize::MAX
        } else {
            options.limit
        };
        Ok(matching.take(limit).cloned().collect())
    }

    fn search_entity(&self, query: &str) -> SyncResult<Vec<SearchHit>> {
        self.begin(GatewayCall::Search(query.to_string()))?;
        let needle = query.to_lowercase();
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| mentions(record, &needle))
            .map(|record| SearchHit {
                uuid: record.uuid(),
                record_type: record.record_type().to_string(),
                origin: record.origin(),
            })
            .collect())
    }
}

fn mentions(record: &CdfRecord, needle: &str) -> bool {
    fn contains(value: &Value, needle: &str) -> bool {
        match value {
            Value::String(s) => s.to_lowercase().contains(needle),
            Value::Array(items) => items.iter().any(|item| contains(item, needle)),
            _ => false,
        }
    }
    record
        .attributes()
        .values()
        .filter(|a| a.attr_type().base() == BaseType::String)
        .flat_map(|a| a.values().values())
        .any(|value| contains(value, needle))
}
