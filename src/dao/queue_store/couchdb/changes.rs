//! `_changes` long-poll feed exposed as a [`ChangeStream`].

use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{Value, from_value};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{
    error::CouchDaoError,
    models::{ChangeRow, DESIGN_PREFIX, FIRST_GENERATION, extract_uuid},
    store::CouchTable,
};
use crate::dao::queue_store::{ChangeStream, RowChange};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Follow the database change feed from `since`, decoding documents of type `D` into rows.
///
/// Transport failures are retried with exponential backoff; the stream only ends when it is
/// dropped.
pub(super) fn change_stream<R, D>(table: CouchTable, since: Value, timeout: Duration) -> ChangeStream<R>
where
    D: DeserializeOwned + Send + 'static,
    R: TryFrom<D, Error = CouchDaoError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut since = since;
        let mut delay = INITIAL_RETRY_DELAY;
        loop {
            match table.changes(&since, timeout).await {
                Ok(response) => {
                    delay = INITIAL_RETRY_DELAY;
                    for row in response.results {
                        if let Some(change) = decode_change::<R, D>(table.database(), row) {
                            yield change;
                        }
                    }
                    since = response.last_seq;
                }
                Err(err) => {
                    warn!(
                        database = table.database(),
                        error = %err,
                        "CouchDB change feed request failed; retrying"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    };
    stream.boxed()
}

fn decode_change<R, D>(database: &str, row: ChangeRow) -> Option<RowChange<R>>
where
    D: DeserializeOwned,
    R: TryFrom<D, Error = CouchDaoError>,
{
    if row.id.starts_with(DESIGN_PREFIX) {
        return None;
    }

    let id = match extract_uuid(&row.id) {
        Ok(id) => id,
        Err(err) => {
            debug!(database, error = %err, "ignoring change for foreign document");
            return None;
        }
    };

    if row.deleted {
        return Some(RowChange::Delete(id));
    }

    let Some(doc) = row.doc else {
        warn!(database, doc_id = %row.id, "change without document body");
        return None;
    };

    let decoded = from_value::<D>(doc)
        .map_err(|source| CouchDaoError::DeserializeValue {
            path: row.id.clone(),
            source,
        })
        .and_then(R::try_from);

    match decoded {
        Ok(entity) => {
            let first_write = row
                .changes
                .first()
                .is_some_and(|change| change.rev.starts_with(FIRST_GENERATION));
            if first_write {
                Some(RowChange::Insert(entity))
            } else {
                Some(RowChange::Update(entity))
            }
        }
        Err(err) => {
            warn!(database, error = %err, "failed to decode changed document");
            None
        }
    }
}
