//! Resumable listings.
//!
//! Each `(category, path, query, type)` key owns one cursor. Repeated
//! requests walk forward through the plugin's pages, a refresh restarts from
//! the first page, and a failed fetch leaves the cursor where it was.

use crate::models::{CatalogEntry, PageCursor};
use crate::plugin::{CatalogRequest, Plugin, PluginResult};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing requested yet.
    Fresh,
    /// At least one page returned; more may follow from this position.
    InProgress(PageCursor),
    /// The last fetch returned nothing new.
    Exhausted,
}

/// Cursor bookkeeping for one plugin instance.
///
/// Requests for the same key must be serialized by the caller; the `&mut`
/// receiver enforces that within one owner.
#[derive(Debug, Default)]
pub struct Paginator {
    cursors: HashMap<CatalogRequest, CursorState>,
}

impl Paginator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next page of `key`, or the first page when `refresh` is set.
    pub fn request<P: Plugin + ?Sized>(
        &mut self,
        plugin: &P,
        key: &CatalogRequest,
        refresh: bool,
    ) -> PluginResult<Vec<CatalogEntry>> {
        if refresh {
            self.cursors.remove(key);
        }

        let position = match self.state(key) {
            CursorState::Fresh => None,
            CursorState::InProgress(cursor) => Some(cursor),
            CursorState::Exhausted => {
                tracing::trace!(?key, "listing exhausted, not contacting plugin");
                return Ok(Vec::new());
            }
        };

        let page = plugin
            .get_media_items(key, position.as_ref())
            .inspect_err(|err| {
                tracing::warn!(plugin = plugin.name(), ?key, "page fetch failed: {err}");
            })?;

        let next_state = match page.next {
            Some(next) if !page.items.is_empty() => CursorState::InProgress(next),
            _ => CursorState::Exhausted,
        };
        tracing::debug!(
            plugin = plugin.name(),
            category = %key.category,
            items = page.items.len(),
            state = ?next_state,
            "fetched page"
        );
        self.cursors.insert(key.clone(), next_state);
        Ok(page.items)
    }

    pub fn state(&self, key: &CatalogRequest) -> CursorState {
        self.cursors.get(key).cloned().unwrap_or(CursorState::Fresh)
    }

    /// Forgets the cursor of `key`; the next request starts over.
    pub fn reset(&mut self, key: &CatalogRequest) {
        self.cursors.remove(key);
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
