//! # Document Store
//!
//! The in-memory collection. Documents keep insertion order; a put with an
//! existing `_id` replaces that document where it stands.
//!
//! ## Invariants
//!
//! - `_id` is unique across the whole store, not per kind
//! - every write takes a fresh `_rev` from one store-wide counter that only
//!   moves forward, including across `load`
//! - `put` and `merge` validate the whole batch before touching anything

use super::document::{new_id, Document, DEL, ID, REV};
use super::errors::DbError;
use super::page::{chunk, PageCache};
use super::query::Query;
use super::value_objects::{StoreConfig, WriteResult, MAX_RESERVE_IDS};
use crate::adapters::JsonFileSnapshot;
use crate::ports::outbound::SnapshotIo;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Result of [`DocumentStore::query`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub results: Vec<Document>,
    /// Page id of the following slice.
    pub next: Option<String>,
    /// Total matches, when the query asked for `count`.
    pub count: Option<usize>,
}

/// In-memory document collection with paging.
pub struct DocumentStore {
    config: StoreConfig,
    documents: Vec<Document>,
    pages: PageCache,
    rev: u64,
    last_purge_rev: u64,
    snapshots: Box<dyn SnapshotIo>,
}

impl DocumentStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            documents: Vec::new(),
            pages: PageCache::new(),
            rev: 0,
            last_purge_rev: 0,
            snapshots: Box::new(JsonFileSnapshot),
        }
    }

    /// Replace the snapshot backend used by `dump` and `load`.
    #[must_use]
    pub fn with_snapshot_io(mut self, snapshots: Box<dyn SnapshotIo>) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Most recently issued revision (0 before the first write).
    pub fn last_rev(&self) -> u64 {
        self.rev
    }

    /// Revision of the last purge (0 if none).
    pub fn last_purge_rev(&self) -> u64 {
        self.last_purge_rev
    }

    /// Documents physically present, deleted or not.
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.rev
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.documents.iter().position(|doc| doc.id() == Some(id))
    }

    /// Insert or replace documents.
    ///
    /// # Errors
    ///
    /// `KindNotSpecified` if any object is not an object or lacks a
    /// non-empty string `_kind`. Nothing is written in that case.
    pub fn put(&mut self, objects: Vec<Value>) -> Result<Vec<WriteResult>, DbError> {
        let docs = objects
            .into_iter()
            .map(|object| {
                Document::from_value(object)
                    .filter(|doc| doc.kind().is_some())
                    .ok_or(DbError::KindNotSpecified)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = Vec::with_capacity(docs.len());
        for mut doc in docs {
            let existing = doc.id().filter(|id| !id.is_empty()).map(str::to_string);
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = new_id();
                    doc.set(ID, id.clone());
                    id
                }
            };
            let rev = self.next_rev();
            doc.set(REV, rev);

            match self.position(&id) {
                Some(index) => self.documents[index] = doc,
                None => self.documents.push(doc),
            }
            results.push(WriteResult { id, rev });
        }

        debug!(written = results.len(), rev = self.rev, "put");
        Ok(results)
    }

    /// Shallow-merge objects onto the documents their `_id`s name.
    ///
    /// # Errors
    ///
    /// - `MergeMissingId`: an object has no `_id` (or is not an object)
    /// - `MergeUnknownId`: an `_id` matches no stored document
    ///
    /// Either error leaves the store unchanged.
    pub fn merge(&mut self, objects: Vec<Value>) -> Result<Vec<WriteResult>, DbError> {
        let docs = objects
            .into_iter()
            .map(|object| {
                Document::from_value(object)
                    .filter(|doc| doc.id().is_some())
                    .ok_or(DbError::MergeMissingId)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut targets = Vec::with_capacity(docs.len());
        for doc in &docs {
            let index = doc
                .id()
                .and_then(|id| self.position(id))
                .ok_or(DbError::MergeUnknownId)?;
            targets.push(index);
        }

        let mut results = Vec::with_capacity(docs.len());
        for (doc, index) in docs.iter().zip(targets) {
            let rev = self.next_rev();
            let stored = &mut self.documents[index];
            stored.merge_from(doc.fields());
            stored.set(REV, rev);
            let id = stored.id().unwrap_or_default().to_string();
            results.push(WriteResult { id, rev });
        }

        debug!(merged = results.len(), rev = self.rev, "merge");
        Ok(results)
    }

    /// Delete by id. `purge` removes documents; otherwise they are marked
    /// `_del: true`. Unknown ids are skipped. Results follow store order.
    pub fn del(&mut self, ids: &[String], purge: bool) -> Vec<WriteResult> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut results = Vec::new();

        if purge {
            let mut kept = Vec::with_capacity(self.documents.len());
            for doc in std::mem::take(&mut self.documents) {
                match doc.id().filter(|id| wanted.contains(id)) {
                    Some(id) => {
                        let id = id.to_string();
                        let rev = self.next_rev();
                        results.push(WriteResult { id, rev });
                    }
                    None => kept.push(doc),
                }
            }
            self.documents = kept;
        } else {
            for index in 0..self.documents.len() {
                let Some(id) = self.documents[index]
                    .id()
                    .filter(|id| wanted.contains(id))
                    .map(str::to_string)
                else {
                    continue;
                };
                let rev = self.next_rev();
                let doc = &mut self.documents[index];
                doc.set(DEL, true);
                doc.set(REV, rev);
                results.push(WriteResult { id, rev });
            }
        }

        debug!(deleted = results.len(), purge, "del");
        results
    }

    /// Drop every soft-deleted document. Returns how many were removed.
    pub fn compact(&mut self) -> usize {
        let before = self.documents.len();
        self.documents.retain(|doc| !doc.is_deleted());
        let removed = before - self.documents.len();
        debug!(removed, "compact");
        removed
    }

    /// Compact and record the purge revision.
    pub fn purge(&mut self) -> usize {
        let removed = self.compact();
        self.last_purge_rev = self.next_rev();
        removed
    }

    /// Run a query, materializing pages when results exceed `limit`.
    ///
    /// # Errors
    ///
    /// - `RequiredProp("from")`: neither `from` nor `page`
    /// - `PageNotFound`: unknown page id
    pub fn query(&mut self, query: &Query) -> Result<QueryResult, DbError> {
        if let Some(page_id) = query.page.as_deref() {
            let page = self
                .pages
                .get(page_id)
                .ok_or_else(|| DbError::PageNotFound(page_id.to_string()))?;
            return Ok(QueryResult {
                results: page.results.clone(),
                next: page.next.clone(),
                count: query.count.then_some(page.total),
            });
        }

        let matches = self.evaluate(query)?;
        let total = matches.len();
        let count = query.count.then_some(total);
        let limit = self.config.effective_limit(query.limit);

        if limit == 0 {
            let next = if self.config.page_on_zero_limit && total > 0 {
                let size = self.config.default_limit.max(1);
                self.pages.materialize(chunk(matches, size), total)
            } else {
                None
            };
            return Ok(QueryResult {
                results: Vec::new(),
                next,
                count,
            });
        }

        if total > limit {
            let mut chunks = chunk(matches, limit).into_iter();
            let results = chunks.next().unwrap_or_default();
            let next = self.pages.materialize(chunks.collect(), total);
            return Ok(QueryResult {
                results,
                next,
                count,
            });
        }

        Ok(QueryResult {
            results: matches,
            next: None,
            count,
        })
    }

    /// Filter, sort and project without paging.
    pub fn evaluate(&self, query: &Query) -> Result<Vec<Document>, DbError> {
        let mut matches = self.matching(query)?;
        query.sort(&mut matches);
        Ok(matches.iter().map(|doc| query.project(doc)).collect())
    }

    /// Ids of every match, in result order.
    pub fn matching_ids(&self, query: &Query) -> Result<Vec<String>, DbError> {
        let mut matches = self.matching(query)?;
        query.sort(&mut matches);
        Ok(matches
            .iter()
            .filter_map(|doc| doc.id().map(str::to_string))
            .collect())
    }

    fn matching(&self, query: &Query) -> Result<Vec<Document>, DbError> {
        if query.from.is_none() {
            return Err(DbError::RequiredProp("from"));
        }
        Ok(self
            .documents
            .iter()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect())
    }

    /// Documents whose `_id` is in `ids`, in store order, deleted included.
    pub fn get(&self, ids: &[String]) -> Vec<Document> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.documents
            .iter()
            .filter(|doc| doc.id().is_some_and(|id| wanted.contains(id)))
            .cloned()
            .collect()
    }

    /// `count` fresh ids, at most [`MAX_RESERVE_IDS`].
    pub fn reserve_ids(&self, count: usize) -> Vec<String> {
        (0..count.min(MAX_RESERVE_IDS)).map(|_| new_id()).collect()
    }

    /// Write every document to `path`.
    pub fn dump(&self, path: &Path) -> Result<(), DbError> {
        self.snapshots.write(path, &self.documents)?;
        info!(path = %path.display(), documents = self.documents.len(), "Store dumped");
        Ok(())
    }

    /// Replace the store with the snapshot at `path`.
    ///
    /// Discards materialized pages and moves the revision counter past every
    /// loaded `_rev`. Every entry needs a `_id` and `_kind`, and ids must be
    /// unique. A failed read or a rejected snapshot leaves the store untouched.
    pub fn load(&mut self, path: &Path) -> Result<usize, DbError> {
        let docs = self.snapshots.read(path)?;
        check_snapshot(path, &docs)?;
        let max_rev = docs.iter().filter_map(Document::rev).max().unwrap_or(0);
        self.rev = self.rev.max(max_rev);
        self.documents = docs;
        self.pages.clear();
        info!(path = %path.display(), documents = self.documents.len(), rev = self.rev, "Store loaded");
        Ok(self.documents.len())
    }
}

fn check_snapshot(path: &Path, docs: &[Document]) -> Result<(), DbError> {
    let rejected = |reason: String| DbError::Snapshot {
        path: path.display().to_string(),
        reason,
    };
    let mut seen = HashSet::with_capacity(docs.len());
    for (i, doc) in docs.iter().enumerate() {
        let Some(id) = doc.id().filter(|id| !id.is_empty()) else {
            return Err(rejected(format!("entry {i} has no _id")));
        };
        if doc.kind().is_none() {
            return Err(rejected(format!("entry {i} has no _kind")));
        }
        if !seen.insert(id) {
            return Err(rejected(format!("duplicate _id '{id}' at entry {i}")));
        }
    }
    Ok(())
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.config)
            .field("documents", &self.documents.len())
            .field("pages", &self.pages.len())
            .field("rev", &self.rev)
            .finish()
    }
}
