use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{join_all, try_join_all, BoxFuture};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::dates::normalize_dates;
use super::options::absolute_path;
use super::ProviderError;
use crate::firestore::query::Query;
use crate::firestore::reference::CollectionReference;
use crate::firestore::snapshot::DocumentSnapshot;
use crate::firestore::FirebaseFirestore;
use crate::identity::FirebaseAuth;

/// How deep `<name>_id` references are chased before expansion stops, so a
/// reference cycle terminates instead of recursing forever.
const MAX_REFERENCE_DEPTH: usize = 5;

/// Field-name suffix marking a foreign document id.
const REFERENCE_SUFFIX: &str = "_id";

/// Caller-supplied transform scoping the collection read of a refresh.
pub type CollectionQuery = dyn Fn(Query) -> Query + Send + Sync;

/// Cache entry for one logical resource name.
#[derive(Clone)]
pub struct Resource {
    pub path: String,
    pub path_absolute: String,
    pub collection: CollectionReference,
    pub list: Vec<Value>,
}

/// Maps logical resource names to collection handles and locally cached
/// document lists.
///
/// Keys are the relative names the admin framework uses; the backend paths
/// they resolve to may sit under a root prefix. The cache lives behind a
/// lock that is only taken for map reads and swaps, never across a network
/// round-trip, so a refresh racing a logout cannot tear an entry.
pub struct ResourceManager {
    db: FirebaseFirestore,
    root_ref: Option<String>,
    cache: Arc<RwLock<HashMap<String, Resource>>>,
}

impl ResourceManager {
    pub fn new(db: FirebaseFirestore, root_ref: Option<String>) -> Self {
        Self {
            db,
            root_ref,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drops every cache entry when the user signs out.
    pub fn clear_on_logout(&self, auth: &FirebaseAuth) {
        let cache = Arc::clone(&self.cache);
        auth.on_logout(move || {
            debug!("clearing resource cache on logout");
            cache
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        });
    }

    /// Idempotently creates the cache entry for a logical resource name and
    /// returns a clone of it.
    pub fn try_get_resource(&self, relative_path: &str) -> Result<Resource, ProviderError> {
        Ok(self.init_path(relative_path))
    }

    /// Pure cache lookup; errors when the resource was never initialized
    /// (or a logout dropped it).
    pub fn get_resource(&self, relative_path: &str) -> Result<Resource, ProviderError> {
        self.read()
            .get(relative_path)
            .cloned()
            .ok_or_else(|| ProviderError::ResourceNotFound(relative_path.to_string()))
    }

    /// Re-runs the (optionally query-scoped) collection read and replaces
    /// the cached list. Every returned document gets its id injected, dates
    /// normalized and `_id` references expanded.
    pub async fn refresh_resource(
        &self,
        relative_path: &str,
        collection_query: Option<&CollectionQuery>,
    ) -> Result<(), ProviderError> {
        let resource = self.init_path(relative_path);
        debug!(resource = relative_path, "refreshing resource");

        let mut query = resource.collection.query();
        if let Some(scope) = collection_query {
            query = query.map_query(|q| scope(q));
        }
        let snapshot = query.get().await?;

        let docs = snapshot
            .iter()
            .map(parse_document)
            .collect::<Result<Vec<_>, _>>()?;

        let list = try_join_all(docs.into_iter().map(|doc| self.expand_references(doc, 0))).await?;
        debug!(
            resource = relative_path,
            count = list.len(),
            "resource list replaced"
        );

        let mut cache = self.write();
        if let Some(entry) = cache.get_mut(relative_path) {
            entry.list = list;
        }
        // A logout that raced the read leaves the cache empty; the fetched
        // list is dropped instead of resurrecting the entry.
        Ok(())
    }

    /// Fetches one document by id, normalized and reference-expanded.
    /// Errors when the document does not exist.
    pub async fn get_single_doc(
        &self,
        relative_path: &str,
        doc_id: &str,
    ) -> Result<Value, ProviderError> {
        self.get_single_doc_at(relative_path.to_string(), doc_id.to_string(), 0)
            .await
    }

    fn get_single_doc_at(
        &self,
        relative_path: String,
        doc_id: String,
        depth: usize,
    ) -> BoxFuture<'_, Result<Value, ProviderError>> {
        Box::pin(async move {
            let resource = self.init_path(&relative_path);
            let fields: Option<Map<String, Value>> =
                resource.collection.doc(&doc_id).get().await?;
            let Some(fields) = fields else {
                return Err(ProviderError::DocumentNotFound {
                    path: relative_path,
                    id: doc_id,
                });
            };

            let mut data = Value::Object(fields);
            normalize_dates(&mut data);
            if let Value::Object(map) = &mut data {
                map.insert("id".to_string(), Value::String(doc_id));
            }
            self.expand_references(data, depth).await
        })
    }

    /// Embeds the documents referenced by `<name>_id` fields under `<name>`,
    /// up to [`MAX_REFERENCE_DEPTH`] levels. Sub-fetches for one document
    /// run concurrently; results are applied in field order. A dangling
    /// reference is left unexpanded.
    fn expand_references(
        &self,
        doc: Value,
        depth: usize,
    ) -> BoxFuture<'_, Result<Value, ProviderError>> {
        Box::pin(async move {
            if depth >= MAX_REFERENCE_DEPTH {
                warn!(depth, "reference expansion depth limit reached");
                return Ok(doc);
            }
            let mut map = match doc {
                Value::Object(map) => map,
                other => return Ok(other),
            };

            let refs: Vec<(String, String, String)> = map
                .iter()
                .filter_map(|(key, value)| {
                    let target = key.strip_suffix(REFERENCE_SUFFIX)?;
                    let id = value.as_str()?;
                    if target.is_empty() || id.is_empty() {
                        return None;
                    }
                    Some((key.clone(), target.to_string(), id.to_string()))
                })
                .collect();

            if refs.is_empty() {
                return Ok(Value::Object(map));
            }

            let fetches = refs.iter().map(|(_, target, id)| {
                self.get_single_doc_at(target.clone(), id.clone(), depth + 1)
            });
            let results = join_all(fetches).await;

            for ((key, target, id), result) in refs.into_iter().zip(results) {
                match result {
                    Ok(embedded) => {
                        debug!(field = %key, target = %target, id = %id, "embedded referenced document");
                        map.insert(target, embedded);
                    }
                    Err(ProviderError::DocumentNotFound { .. }) => {
                        warn!(field = %key, target = %target, id = %id, "dangling reference left unexpanded");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(Value::Object(map))
        })
    }

    fn init_path(&self, relative_path: &str) -> Resource {
        if let Some(existing) = self.read().get(relative_path) {
            return existing.clone();
        }

        let path_absolute = absolute_path(self.root_ref.as_deref(), relative_path);
        debug!(resource = relative_path, path = %path_absolute, "initializing resource");
        let resource = Resource {
            path: relative_path.to_string(),
            path_absolute: path_absolute.clone(),
            collection: self.db.collection(&path_absolute),
            list: Vec::new(),
        };

        let mut cache = self.write();
        cache
            .entry(relative_path.to_string())
            .or_insert(resource)
            .clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Resource>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Resource>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Document fields as a JSON object with normalized dates and the document
/// id injected. A snapshot without a body becomes an empty object.
fn parse_document(snap: &DocumentSnapshot) -> Result<Value, ProviderError> {
    let fields: Map<String, Value> = match snap.data()? {
        Some(fields) => fields,
        None => {
            warn!(id = snap.id(), "snapshot without document body");
            Map::new()
        }
    };

    let mut data = Value::Object(fields);
    normalize_dates(&mut data);
    if let Value::Object(map) = &mut data {
        map.insert("id".to_string(), Value::String(snap.id().to_string()));
    }
    Ok(data)
}
