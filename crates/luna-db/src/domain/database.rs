//! # Database
//!
//! A [`DocumentStore`] plus its [`WatchEngine`]. Every successful mutation
//! re-evaluates the armed watches before returning, so a caller that has
//! seen a write complete knows its notifications are already queued.

use super::document::{Document, ID, KIND};
use super::errors::DbError;
use super::query::Query;
use super::store::{DocumentStore, QueryResult};
use super::value_objects::{MutationEvent, StoreConfig, WriteResult};
use super::watch::{Watch, WatchEngine};
use crate::ports::outbound::WatchChannel;
use serde_json::Value;
use shared_types::Payload;
use std::path::Path;

/// Store and watches behind one lock.
#[derive(Debug, Default)]
pub struct Database {
    store: DocumentStore,
    watches: WatchEngine,
}

impl Database {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_store(DocumentStore::new(config))
    }

    pub fn with_store(store: DocumentStore) -> Self {
        Self {
            store,
            watches: WatchEngine::new(),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    fn notify(&mut self, event: MutationEvent) {
        self.watches.on_mutation(&self.store, event);
    }

    pub fn put(&mut self, objects: Vec<Value>) -> Result<Vec<WriteResult>, DbError> {
        let results = self.store.put(objects)?;
        self.notify(MutationEvent::Put);
        Ok(results)
    }

    pub fn merge(&mut self, objects: Vec<Value>) -> Result<Vec<WriteResult>, DbError> {
        let results = self.store.merge(objects)?;
        self.notify(MutationEvent::Merge);
        Ok(results)
    }

    /// Merge `props` into every document matching `query`.
    pub fn merge_query(
        &mut self,
        query: &Query,
        props: &Payload,
    ) -> Result<Vec<WriteResult>, DbError> {
        let objects = self
            .store
            .matching_ids(query)?
            .into_iter()
            .map(|id| {
                let mut fields = props.clone();
                fields.insert(ID.to_string(), Value::String(id));
                Value::Object(fields)
            })
            .collect();
        self.merge(objects)
    }

    /// Merge `props` into the matches of `query`, or put `props` as a new
    /// document when nothing matches. `_kind` defaults to `query.from`.
    pub fn merge_put(
        &mut self,
        query: &Query,
        props: &Payload,
    ) -> Result<Vec<WriteResult>, DbError> {
        if !self.store.matching_ids(query)?.is_empty() {
            return self.merge_query(query, props);
        }

        let mut fields = props.clone();
        if !fields.contains_key(KIND) {
            if let Some(from) = &query.from {
                fields.insert(KIND.to_string(), Value::String(from.clone()));
            }
        }
        self.put(vec![Value::Object(fields)])
    }

    pub fn del(&mut self, ids: &[String], purge: bool) -> Vec<WriteResult> {
        let results = self.store.del(ids, purge);
        self.notify(MutationEvent::Del);
        results
    }

    /// Delete every match of `query`. Returns how many were deleted.
    pub fn del_query(&mut self, query: &Query, purge: bool) -> Result<usize, DbError> {
        let ids = self.store.matching_ids(query)?;
        Ok(self.del(&ids, purge).len())
    }

    pub fn compact(&mut self) -> usize {
        let removed = self.store.compact();
        self.notify(MutationEvent::Compact);
        removed
    }

    pub fn purge(&mut self) -> usize {
        let removed = self.store.purge();
        self.notify(MutationEvent::Compact);
        removed
    }

    pub fn load(&mut self, path: &Path) -> Result<usize, DbError> {
        let loaded = self.store.load(path)?;
        self.notify(MutationEvent::Load);
        Ok(loaded)
    }

    pub fn dump(&self, path: &Path) -> Result<(), DbError> {
        self.store.dump(path)
    }

    pub fn query(&mut self, query: &Query) -> Result<QueryResult, DbError> {
        self.store.query(query)
    }

    pub fn evaluate(&self, query: &Query) -> Result<Vec<Document>, DbError> {
        self.store.evaluate(query)
    }

    pub fn get(&self, ids: &[String]) -> Vec<Document> {
        self.store.get(ids)
    }

    pub fn reserve_ids(&self, count: usize) -> Vec<String> {
        self.store.reserve_ids(count)
    }

    /// Arm a one-shot watch.
    pub fn watch_once(&mut self, token: &str, query: Query, channel: Box<dyn WatchChannel>) {
        self.watches.add(Watch::one_shot(token, query, channel));
    }

    /// Arm a streaming watch against the current result set.
    pub fn watch_changes(
        &mut self,
        token: &str,
        query: Query,
        channel: Box<dyn WatchChannel>,
    ) -> Result<(), DbError> {
        let snapshot = self.store.evaluate(&query)?;
        self.watches
            .add(Watch::streaming(token, query, channel, snapshot));
        Ok(())
    }

    pub fn unwatch(&mut self, token: &str) -> bool {
        self.watches.remove(token)
    }
}
