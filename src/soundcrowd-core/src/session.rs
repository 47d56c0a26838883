//! Host-facing facade over one plugin instance.

use crate::metadata_db::MetadataDatabase;
use crate::models::{CatalogEntry, MediaId, PlayableItem};
use crate::pagination::{CursorState, Paginator};
use crate::plugin::{CatalogRequest, Plugin, PluginError, PluginResult};
use crate::resolver::{self, Resolution};
use std::sync::Arc;

/// One logical browsing session against a plugin.
///
/// Owns the pagination cursors of the plugin and, optionally, a handle to
/// the shared record store used to remember resolved items.
pub struct PluginSession {
    plugin: Arc<dyn Plugin>,
    cursors: Paginator,
    records: Option<MetadataDatabase>,
}

impl PluginSession {
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            plugin,
            cursors: Paginator::new(),
            records: None,
        }
    }

    pub fn with_records(mut self, records: MetadataDatabase) -> Self {
        self.records = Some(records);
        self
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    /// Next page of a top-level category.
    pub fn get_media_items(
        &mut self,
        category: &str,
        refresh: bool,
    ) -> PluginResult<Vec<CatalogEntry>> {
        self.request(&CatalogRequest::category(category), refresh)
    }

    /// Next page of a node inside a category.
    pub fn get_media_items_at(
        &mut self,
        category: &str,
        path: &str,
        refresh: bool,
    ) -> PluginResult<Vec<CatalogEntry>> {
        self.request(&CatalogRequest::at_path(category, path), refresh)
    }

    /// Next page of search results for `query`.
    pub fn search_media_items(
        &mut self,
        category: &str,
        path: &str,
        query: &str,
        search_type: Option<&str>,
        refresh: bool,
    ) -> PluginResult<Vec<CatalogEntry>> {
        let request =
            CatalogRequest::search(category, path, query, search_type.map(str::to_string));
        self.request(&request, refresh)
    }

    pub fn request(
        &mut self,
        request: &CatalogRequest,
        refresh: bool,
    ) -> PluginResult<Vec<CatalogEntry>> {
        let plugin = Arc::clone(&self.plugin);
        self.cursors.request(plugin.as_ref(), request, refresh)
    }

    pub fn cursor_state(&self, request: &CatalogRequest) -> CursorState {
        self.cursors.state(request)
    }

    /// Resolves `item` for playback and remembers it in the record store.
    ///
    /// Store failures are logged and never fail the resolution.
    pub fn resolve(&self, item: &PlayableItem) -> PluginResult<Resolution> {
        let resolution = resolver::resolve(self.plugin.as_ref(), item).inspect_err(|err| {
            tracing::warn!(plugin = self.plugin.name(), id = %item.id, "resolution failed: {err}");
        })?;

        if let Some(records) = &self.records {
            match records.put_item(item) {
                Ok(true) => tracing::debug!(id = %item.id, "cached media record"),
                Ok(false) => {}
                Err(err) => tracing::warn!(id = %item.id, "failed to cache media record: {err}"),
            }
        }
        Ok(resolution)
    }

    /// Previously resolved item, rebuilt from the record store.
    pub fn lookup(&self, id: &MediaId) -> PluginResult<Option<PlayableItem>> {
        let Some(records) = &self.records else {
            return Ok(None);
        };
        let record = records.get(id.local_part()).map_err(|err| PluginError::Other {
            message: format!("record store: {err}"),
        })?;
        Ok(record.map(|r| r.to_playable(Some(self.plugin.name()))))
    }

    /// Looks `id` up in the record store and resolves the cached item.
    pub fn resolve_cached(&self, id: &MediaId) -> PluginResult<Resolution> {
        let item = self.lookup(id)?.ok_or_else(|| PluginError::NotFound {
            entity: id.to_string(),
        })?;
        resolver::resolve(self.plugin.as_ref(), &item)
    }

    pub fn favorite(&self, id: &MediaId) -> PluginResult<bool> {
        self.plugin.favorite(id)
    }

    pub fn suggestions(&self, category: &str, query: &str) -> PluginResult<Vec<String>> {
        self.plugin.get_suggestions(category, query)
    }
}
