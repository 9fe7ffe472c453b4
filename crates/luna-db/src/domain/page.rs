//! # Pages
//!
//! A page is an immutable slice of a query's result list, materialized when
//! the query ran. Later writes never change a page.

use super::document::{new_id, Document};
use std::collections::HashMap;

/// One materialized slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub results: Vec<Document>,
    /// Id of the following page, absent on the last one.
    pub next: Option<String>,
    /// Total matches of the query that produced this page.
    pub total: usize,
}

/// Pages by opaque id.
#[derive(Debug, Default)]
pub struct PageCache {
    pages: HashMap<String, Page>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `chunks` as a chain of pages. Returns the id of the first one.
    pub fn materialize(&mut self, chunks: Vec<Vec<Document>>, total: usize) -> Option<String> {
        let mut next = None;
        for results in chunks.into_iter().rev() {
            let id = new_id();
            self.pages.insert(
                id.clone(),
                Page {
                    results,
                    next,
                    total,
                },
            );
            next = Some(id);
        }
        next
    }

    pub fn get(&self, id: &str) -> Option<&Page> {
        self.pages.get(id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

/// Split `items` into chunks of `size` (which must be non-zero).
pub fn chunk(items: Vec<Document>, size: usize) -> Vec<Vec<Document>> {
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size.max(1)));
    let mut current = Vec::with_capacity(size);
    for item in items {
        current.push(item);
        if current.len() == size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
