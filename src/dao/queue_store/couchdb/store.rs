use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use uuid::Uuid;

use crate::dao::{
    models::{
        GameRowEntity, GameRowPatch, QueueRowEntity, QueueRowPatch, sort_game_rows,
        sort_queue_rows,
    },
    queue_store::{ChangeStream, QueueStore},
    storage::StorageResult,
};

use super::{
    changes::change_stream,
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, BulkDocsRequest, BulkDocsResult, ChangesResponse, CouchDeletion,
        CouchErrorBody, CouchGameDocument, CouchQueueDocument, DESIGN_PREFIX, DatabaseInfo,
        KeysRequest, doc_id,
    },
};

/// HTTP handle on a single CouchDB database.
#[derive(Clone)]
pub(super) struct CouchTable {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchTable {
    pub(super) fn database(&self) -> &str {
        &self.database
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = if path.is_empty() {
            format!("{}/{}", self.base_url, self.database)
        } else {
            format!("{}/{}/{}", self.base_url, self.database, path)
        };
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, path: &str) -> CouchResult<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    /// Turn a non-success response into the matching error, separating missing databases
    /// from every other failure.
    async fn status_error(&self, path: &str, response: reqwest::Response) -> CouchDaoError {
        let status = response.status();
        let body = response.json::<CouchErrorBody>().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND && (path.is_empty() || body.is_missing_database()) {
            return CouchDaoError::DatabaseMissing {
                database: self.database.to_string(),
            };
        }
        CouchDaoError::RequestStatus {
            path: path.to_string(),
            status,
        }
    }

    async fn decode<T>(&self, path: &str, response: reqwest::Response) -> CouchResult<T>
    where
        T: DeserializeOwned,
    {
        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    pub(super) async fn info(&self) -> CouchResult<DatabaseInfo> {
        let response = self.send(self.request(Method::GET, ""), "").await?;
        if !response.status().is_success() {
            return Err(self.status_error("", response).await);
        }
        self.decode("", response).await
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::GET, doc_id), doc_id).await?;
        let status = response.status();
        if status.is_success() {
            return self.decode(doc_id, response).await.map(Some);
        }
        match self.status_error(doc_id, response).await {
            CouchDaoError::RequestStatus { status, .. } if status == StatusCode::NOT_FOUND => {
                Ok(None)
            }
            other => Err(other),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .send(self.request(Method::PUT, doc_id).json(document), doc_id)
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.status_error(doc_id, response).await)
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<()> {
        let response = self
            .send(
                self.request(Method::DELETE, doc_id).query(&[("rev", rev)]),
                doc_id,
            )
            .await?;
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.status_error(doc_id, response).await)
        }
    }

    async fn list_documents<T>(&self) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let response = self
            .send(
                self.request(Method::GET, ALL_DOCS)
                    .query(&[("include_docs", "true")]),
                ALL_DOCS,
            )
            .await?;
        if !response.status().is_success() {
            return Err(self.status_error(ALL_DOCS, response).await);
        }

        let payload: AllDocsResponse = self.decode(ALL_DOCS, response).await?;
        let mut documents = Vec::new();
        for row in payload.rows {
            if row
                .id
                .as_deref()
                .is_some_and(|id| id.starts_with(DESIGN_PREFIX))
            {
                continue;
            }
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    /// Current revision of every live document among `keys`.
    async fn revisions(&self, keys: &[String]) -> CouchResult<HashMap<String, String>> {
        const ALL_DOCS: &str = "_all_docs";
        let response = self
            .send(
                self.request(Method::POST, ALL_DOCS).json(&KeysRequest { keys }),
                ALL_DOCS,
            )
            .await?;
        if !response.status().is_success() {
            return Err(self.status_error(ALL_DOCS, response).await);
        }

        let payload: AllDocsResponse = self.decode(ALL_DOCS, response).await?;
        Ok(payload
            .rows
            .into_iter()
            .filter_map(|row| match (row.id, row.value) {
                (Some(id), Some(value)) if !value.deleted => Some((id, value.rev)),
                _ => None,
            })
            .collect())
    }

    async fn bulk_docs<T>(&self, docs: Vec<T>) -> CouchResult<()>
    where
        T: Serialize,
    {
        const BULK_DOCS: &str = "_bulk_docs";
        if docs.is_empty() {
            return Ok(());
        }
        let response = self
            .send(
                self.request(Method::POST, BULK_DOCS)
                    .json(&BulkDocsRequest { docs }),
                BULK_DOCS,
            )
            .await?;
        if !response.status().is_success() {
            return Err(self.status_error(BULK_DOCS, response).await);
        }

        let results: Vec<BulkDocsResult> = self.decode(BULK_DOCS, response).await?;
        let failures = results
            .iter()
            .filter_map(|result| {
                result.error.as_ref().map(|error| {
                    format!(
                        "{}: {} ({})",
                        result.id,
                        error,
                        result.reason.as_deref().unwrap_or("no reason")
                    )
                })
            })
            .collect::<Vec<_>>();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CouchDaoError::BulkRejected {
                database: self.database.to_string(),
                count: failures.len(),
                details: failures.join(", "),
            })
        }
    }

    async fn delete_many(&self, ids: &[Uuid]) -> CouchResult<()> {
        let keys = ids.iter().copied().map(doc_id).collect::<Vec<_>>();
        let revisions = self.revisions(&keys).await?;
        let tombstones = revisions
            .into_iter()
            .map(|(id, rev)| CouchDeletion {
                id,
                rev,
                deleted: true,
            })
            .collect::<Vec<_>>();
        self.bulk_docs(tombstones).await
    }

    pub(super) async fn changes(
        &self,
        since: &Value,
        timeout: Duration,
    ) -> CouchResult<ChangesResponse> {
        const CHANGES: &str = "_changes";
        let since = match since {
            Value::String(seq) => seq.clone(),
            other => other.to_string(),
        };
        let query = [
            ("feed", "longpoll".to_string()),
            ("include_docs", "true".to_string()),
            ("since", since),
            ("timeout", timeout.as_millis().to_string()),
        ];
        let response = self
            .send(self.request(Method::GET, CHANGES).query(&query), CHANGES)
            .await?;
        if !response.status().is_success() {
            return Err(self.status_error(CHANGES, response).await);
        }
        self.decode(CHANGES, response).await
    }
}

/// [`QueueStore`] backed by two CouchDB databases, one per table.
#[derive(Clone)]
pub struct CouchQueueStore {
    queue: CouchTable,
    games: CouchTable,
    changes_timeout: Duration,
}

impl CouchQueueStore {
    /// Build the HTTP client and check that the CouchDB server answers.
    ///
    /// Databases are not created here: a missing database is reported by the first listing
    /// or subscription as a missing table so the operator can provision it.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let table = |database: String| CouchTable {
            client: client.clone(),
            base_url: base_url.clone(),
            database: Arc::<str>::from(database),
            auth: auth.clone(),
        };

        let store = Self {
            queue: table(config.queue_database),
            games: table(config.games_database),
            changes_timeout: config.changes_timeout,
        };

        store.ping_server().await?;
        Ok(store)
    }

    async fn ping_server(&self) -> CouchResult<()> {
        let url = format!("{}/_up", self.queue.base_url);
        let mut builder = self.queue.client.get(&url);
        if let Some((ref user, ref pass)) = self.queue.auth {
            builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
        }
        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: url.clone(),
                source,
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            })
        }
    }

    async fn load_queue(&self) -> CouchResult<Vec<QueueRowEntity>> {
        let mut rows = self
            .queue
            .list_documents::<CouchQueueDocument>()
            .await?
            .into_iter()
            .map(QueueRowEntity::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        sort_queue_rows(&mut rows);
        Ok(rows)
    }
}

impl QueueStore for CouchQueueStore {
    fn list_queue(&self) -> BoxFuture<'static, StorageResult<Vec<QueueRowEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_queue().await.map_err(Into::into) })
    }

    fn list_queue_front(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QueueRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut rows = store.load_queue().await?;
            rows.truncate(limit);
            Ok(rows)
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut rows = store
                .games
                .list_documents::<CouchGameDocument>()
                .await?
                .into_iter()
                .map(GameRowEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            sort_game_rows(&mut rows);
            Ok(rows)
        })
    }

    fn insert_queue_row(&self, row: QueueRowEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = doc_id(row.id);
            let doc = CouchQueueDocument::from((row, None));
            store.queue.put_document(&id, &doc).await.map_err(Into::into)
        })
    }

    fn delete_queue_row(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = doc_id(id);
            let existing = store.queue.get_document::<CouchQueueDocument>(&id).await?;
            if let Some(rev) = existing.and_then(|doc| doc.rev) {
                store.queue.delete_document(&id, &rev).await?;
            }
            Ok(())
        })
    }

    fn update_queue_row(
        &self,
        id: Uuid,
        patch: QueueRowPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = doc_id(id);
            let Some(doc) = store
                .queue
                .get_document::<CouchQueueDocument>(&doc_id)
                .await?
            else {
                return Ok(());
            };
            let rev = doc.rev.clone();
            let mut row = QueueRowEntity::try_from(doc)?;
            patch.apply_to(&mut row);
            let doc = CouchQueueDocument::from((row, rev));
            store
                .queue
                .put_document(&doc_id, &doc)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_queue_rows(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.queue.delete_many(&ids).await.map_err(Into::into) })
    }

    fn upsert_queue_rows(
        &self,
        rows: Vec<QueueRowEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let keys = rows.iter().map(|row| doc_id(row.id)).collect::<Vec<_>>();
            let mut revisions = store.queue.revisions(&keys).await?;
            let docs = rows
                .into_iter()
                .map(|row| {
                    let rev = revisions.remove(&doc_id(row.id));
                    CouchQueueDocument::from((row, rev))
                })
                .collect::<Vec<_>>();
            store.queue.bulk_docs(docs).await.map_err(Into::into)
        })
    }

    fn insert_game_row(&self, row: GameRowEntity) -> BoxFuture<'static, StorageResult<Uuid>> {
        let store = self.clone();
        Box::pin(async move {
            let id = row.id;
            let doc = CouchGameDocument::from((row, None));
            store.games.put_document(&doc_id(id), &doc).await?;
            Ok(id)
        })
    }

    fn delete_game_row(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = doc_id(id);
            let existing = store.games.get_document::<CouchGameDocument>(&id).await?;
            if let Some(rev) = existing.and_then(|doc| doc.rev) {
                store.games.delete_document(&id, &rev).await?;
            }
            Ok(())
        })
    }

    fn update_game_row(
        &self,
        id: Uuid,
        patch: GameRowPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = doc_id(id);
            let Some(doc) = store
                .games
                .get_document::<CouchGameDocument>(&doc_id)
                .await?
            else {
                return Ok(());
            };
            let rev = doc.rev.clone();
            let mut row = GameRowEntity::try_from(doc)?;
            patch.apply_to(&mut row);
            let doc = CouchGameDocument::from((row, rev));
            store
                .games
                .put_document(&doc_id, &doc)
                .await
                .map_err(Into::into)
        })
    }

    fn subscribe_queue_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<ChangeStream<QueueRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let info = store.queue.info().await?;
            Ok(change_stream::<QueueRowEntity, CouchQueueDocument>(
                store.queue.clone(),
                info.update_seq,
                store.changes_timeout,
            ))
        })
    }

    fn subscribe_game_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<ChangeStream<GameRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let info = store.games.info().await?;
            Ok(change_stream::<GameRowEntity, CouchGameDocument>(
                store.games.clone(),
                info.update_seq,
                store.changes_timeout,
            ))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.queue.info().await?;
            store.games.info().await?;
            Ok(())
        })
    }
}
