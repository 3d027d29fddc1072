use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    models::{GameRowEntity, GameStatusEntity, QueueRowEntity},
    queue_store::couchdb::error::CouchDaoError,
};

pub const DESIGN_PREFIX: &str = "_design/";
/// Revisions produced by the first write of a document start with this generation marker.
pub const FIRST_GENERATION: &str = "1-";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub value: Option<RevisionValue>,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RevisionValue {
    pub rev: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Request body for `_all_docs` restricted to a set of keys.
#[derive(Debug, Serialize)]
pub struct KeysRequest<'a> {
    pub keys: &'a [String],
}

/// Request body for `_bulk_docs`.
#[derive(Debug, Serialize)]
pub struct BulkDocsRequest<T> {
    pub docs: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDocsResult {
    pub id: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Tombstone written through `_bulk_docs` to delete a document.
#[derive(Debug, Serialize)]
pub struct CouchDeletion {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

/// Subset of the database info document used for existence checks and feed anchoring.
#[derive(Debug, Deserialize)]
pub struct DatabaseInfo {
    pub update_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    pub changes: Vec<ChangeRevision>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRevision {
    pub rev: String,
}

/// Error body returned by CouchDB alongside non-success status codes.
#[derive(Debug, Default, Deserialize)]
pub struct CouchErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub reason: String,
}

impl CouchErrorBody {
    /// CouchDB answers 404 both for missing documents and missing databases.
    pub fn is_missing_database(&self) -> bool {
        self.reason.contains("Database does not exist")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchQueueDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub row: QueueRowBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRowBody {
    pub name: String,
    pub avatar_seed: u32,
    pub joined_at: i64,
}

impl From<(QueueRowEntity, Option<String>)> for CouchQueueDocument {
    fn from((row, rev): (QueueRowEntity, Option<String>)) -> Self {
        Self {
            id: doc_id(row.id),
            rev,
            row: QueueRowBody {
                name: row.name,
                avatar_seed: row.avatar_seed,
                joined_at: row.joined_at,
            },
        }
    }
}

impl TryFrom<CouchQueueDocument> for QueueRowEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchQueueDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            name: doc.row.name,
            avatar_seed: doc.row.avatar_seed,
            joined_at: doc.row.joined_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameRowBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRowBody {
    pub players: Vec<QueueRowEntity>,
    pub start_time: i64,
    pub status: GameStatusEntity,
}

impl From<(GameRowEntity, Option<String>)> for CouchGameDocument {
    fn from((row, rev): (GameRowEntity, Option<String>)) -> Self {
        Self {
            id: doc_id(row.id),
            rev,
            game: GameRowBody {
                players: row.players,
                start_time: row.start_time,
                status: row.status,
            },
        }
    }
}

impl TryFrom<CouchGameDocument> for GameRowEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchGameDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            players: doc.game.players,
            start_time: doc.game.start_time,
            status: doc.game.status,
        })
    }
}

pub fn doc_id(id: Uuid) -> String {
    id.to_string()
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    Uuid::parse_str(doc_id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
    })
}
