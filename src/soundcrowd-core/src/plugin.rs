use crate::models::{CatalogEntry, MediaId, Page, PageCursor, PlayableItem};
use crate::resolver::DataSource;
use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Capability flags describing optional plugin features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PluginCapabilities {
    pub search: bool,
    pub favorites: bool,
    pub suggestions: bool,
    pub url_resolution: bool,
    pub data_source: bool,
}

impl PluginCapabilities {
    pub fn supports_search(&self) -> bool {
        self.search
    }

    pub fn supports_favorites(&self) -> bool {
        self.favorites
    }

    pub fn supports_suggestions(&self) -> bool {
        self.suggestions
    }

    pub fn resolves_urls(&self) -> bool {
        self.url_resolution || self.data_source
    }
}

/// Failures surfaced by plugins to the host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("upstream returned HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },
    #[error("could not resolve media: {message}")]
    Resolution { message: String },
    #[error("entity not found: {entity}")]
    NotFound { entity: String },
    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },
    #[error("{message}")]
    Other { message: String },
}

impl PluginError {
    pub fn not_supported(operation: impl Into<String>) -> Self {
        PluginError::NotSupported {
            operation: operation.into(),
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        PluginError::Resolution {
            message: message.into(),
        }
    }
}

impl From<TransportError> for PluginError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Http { status, body } => PluginError::UpstreamHttp { status, body },
            TransportError::Io { message } => PluginError::Transport { message },
        }
    }
}

pub type PluginResult<T> = Result<T, PluginError>;

/// Identifies one listing: the pagination cursor of a plugin is keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogRequest {
    pub category: String,
    pub path: Option<String>,
    pub query: Option<String>,
    pub search_type: Option<String>,
}

impl CatalogRequest {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            path: None,
            query: None,
            search_type: None,
        }
    }

    pub fn at_path(category: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::category(category)
        }
    }

    pub fn search(
        category: impl Into<String>,
        path: impl Into<String>,
        query: impl Into<String>,
        search_type: Option<String>,
    ) -> Self {
        Self {
            category: category.into(),
            path: Some(path.into()),
            query: Some(query.into()),
            search_type,
        }
    }

    pub fn is_search(&self) -> bool {
        self.query.is_some()
    }
}

/// A user-visible setting a plugin needs (account name, server URL, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub key: String,
    pub name: String,
    pub description: String,
    pub default_value: Option<String>,
}

/// Named action a plugin exposes to the host, e.g. triggered by a preference.
pub type PluginCallback = Arc<dyn Fn(&str) -> PluginResult<String> + Send + Sync>;

/// Plugin capability surface.
///
/// Only the catalog listing is mandatory; every other capability has a
/// default that either passes through (resolution) or reports
/// [`PluginError::NotSupported`]. Plugins never keep pagination state
/// themselves: the position of a listing is handed in as `cursor`.
pub trait Plugin: Send + Sync {
    /// Display name; also used as the media id namespace.
    fn name(&self) -> &str;

    /// Browsable top-level categories.
    fn media_categories(&self) -> Vec<String>;

    /// Categories that accept a search query.
    fn search_categories(&self) -> Vec<String> {
        Vec::new()
    }

    fn preferences(&self) -> Vec<Preference> {
        Vec::new()
    }

    fn capabilities(&self) -> PluginCapabilities;

    /// Fetch one page of `request`, starting at `cursor` (`None` = first page).
    fn get_media_items(
        &self,
        request: &CatalogRequest,
        cursor: Option<&PageCursor>,
    ) -> PluginResult<Page<CatalogEntry>>;

    /// Toggle the favorite state of an item, returning the new state.
    fn favorite(&self, _id: &MediaId) -> PluginResult<bool> {
        Err(PluginError::not_supported("favorite"))
    }

    fn get_suggestions(&self, _category: &str, _query: &str) -> PluginResult<Vec<String>> {
        Err(PluginError::not_supported("get_suggestions"))
    }

    /// Resolve the declared uri of an item to the actual stream uri, if needed.
    fn get_media_uri(&self, _item: &PlayableItem) -> PluginResult<Option<String>> {
        Ok(None)
    }

    /// Open a byte source for items flagged with `is_data_source`.
    fn get_data_source(&self, _item: &PlayableItem) -> PluginResult<Option<Box<dyn DataSource>>> {
        Ok(None)
    }

    /// Icon bytes (PNG).
    fn icon(&self) -> Option<Vec<u8>> {
        None
    }

    fn callbacks(&self) -> HashMap<String, PluginCallback> {
        HashMap::new()
    }
}

impl<P: Plugin + ?Sized> Plugin for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn media_categories(&self) -> Vec<String> {
        (**self).media_categories()
    }

    fn search_categories(&self) -> Vec<String> {
        (**self).search_categories()
    }

    fn preferences(&self) -> Vec<Preference> {
        (**self).preferences()
    }

    fn capabilities(&self) -> PluginCapabilities {
        (**self).capabilities()
    }

    fn get_media_items(
        &self,
        request: &CatalogRequest,
        cursor: Option<&PageCursor>,
    ) -> PluginResult<Page<CatalogEntry>> {
        (**self).get_media_items(request, cursor)
    }

    fn favorite(&self, id: &MediaId) -> PluginResult<bool> {
        (**self).favorite(id)
    }

    fn get_suggestions(&self, category: &str, query: &str) -> PluginResult<Vec<String>> {
        (**self).get_suggestions(category, query)
    }

    fn get_media_uri(&self, item: &PlayableItem) -> PluginResult<Option<String>> {
        (**self).get_media_uri(item)
    }

    fn get_data_source(&self, item: &PlayableItem) -> PluginResult<Option<Box<dyn DataSource>>> {
        (**self).get_data_source(item)
    }

    fn icon(&self) -> Option<Vec<u8>> {
        (**self).icon()
    }

    fn callbacks(&self) -> HashMap<String, PluginCallback> {
        (**self).callbacks()
    }
}
