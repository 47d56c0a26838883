use crate::models::{CatalogEntry, MediaId};
use crate::pagination::Paginator;
use crate::plugin::{CatalogRequest, Plugin, PluginError};
use crate::resolver::{self, Resolution};
use std::collections::HashSet;
use thiserror::Error;

/// Expectations supplied by a plugin implementation to run the shared contract suite.
#[derive(Debug, Clone)]
pub struct PluginContractExpectations {
    /// Name the plugin reports; every item id is expected in its namespace.
    pub plugin_name: String,
    /// A listing holding more than one page of items.
    pub listing: CatalogRequest,
    /// Required when the plugin advertises search.
    pub search: Option<SearchExpectation>,
}

/// Search expectation used to validate plugin search behavior.
#[derive(Debug, Clone)]
pub struct SearchExpectation {
    pub category: String,
    pub query: String,
    /// The first item id expected for the query (deterministic ordering).
    pub expected_first_id: MediaId,
}

/// Errors surfaced by the plugin contract test harness.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginContractError {
    #[error("plugin reported name {actual:?}, expected {expected:?}")]
    NameMismatch { expected: String, actual: String },
    #[error("plugin exposes no media categories")]
    NoCategories,
    #[error("listing returned no items: {request:?}")]
    EmptyListing { request: CatalogRequest },
    #[error("consecutive pages repeat item {id}")]
    OverlappingPages { id: String },
    #[error("refresh did not restart the listing")]
    RefreshDidNotRestart,
    #[error("item {id} is outside the {expected} namespace")]
    ForeignItem { id: String, expected: String },
    #[error("plugin advertises search but no search expectation supplied")]
    MissingSearchExpectation,
    #[error("search returned no items for query: {query}")]
    EmptySearch { query: String },
    #[error("search returned wrong first item: expected {expected}, got {actual}")]
    SearchWrongFirstItem { expected: MediaId, actual: String },
    #[error("plugin does not advertise search but exposes search categories")]
    UnadvertisedSearch,
    #[error("resolution of {id} produced an empty uri")]
    EmptyResolution { id: String },
    #[error("plugin does not advertise {operation} but it did not return NotSupported")]
    NotSupportedExpected { operation: String },
    #[error("plugin error while running contract: {0}")]
    PluginFailure(String),
}

/// Run the shared plugin contract suite against a plugin implementation.
///
/// Plugins should call this from their crate-level tests with fixtures that
/// exist in their test setup.
pub fn run_plugin_contract<P: Plugin + ?Sized>(
    plugin: &P,
    expectations: &PluginContractExpectations,
) -> Result<(), PluginContractError> {
    if plugin.name() != expectations.plugin_name {
        return Err(PluginContractError::NameMismatch {
            expected: expectations.plugin_name.clone(),
            actual: plugin.name().to_string(),
        });
    }
    if plugin.media_categories().is_empty() {
        return Err(PluginContractError::NoCategories);
    }

    let first_page = verify_listing(plugin, expectations)?;
    verify_search(plugin, expectations)?;
    verify_resolution(plugin, &first_page)?;
    verify_unsupported(plugin)?;
    Ok(())
}

fn failure(err: PluginError) -> PluginContractError {
    PluginContractError::PluginFailure(err.to_string())
}

fn verify_listing<P: Plugin + ?Sized>(
    plugin: &P,
    expectations: &PluginContractExpectations,
) -> Result<Vec<CatalogEntry>, PluginContractError> {
    let request = &expectations.listing;
    let mut pages = Paginator::new();

    let first = pages.request(plugin, request, false).map_err(failure)?;
    if first.is_empty() {
        return Err(PluginContractError::EmptyListing {
            request: request.clone(),
        });
    }
    let prefix = format!("{}|", expectations.plugin_name);
    if let Some(foreign) = first.iter().find(|e| !e.id().starts_with(&prefix)) {
        return Err(PluginContractError::ForeignItem {
            id: foreign.id().to_string(),
            expected: expectations.plugin_name.clone(),
        });
    }

    let seen: HashSet<&str> = first.iter().map(CatalogEntry::id).collect();
    let second = pages.request(plugin, request, false).map_err(failure)?;
    if let Some(repeated) = second.iter().find(|e| seen.contains(e.id())) {
        return Err(PluginContractError::OverlappingPages {
            id: repeated.id().to_string(),
        });
    }

    let restarted = pages.request(plugin, request, true).map_err(failure)?;
    if restarted != first {
        return Err(PluginContractError::RefreshDidNotRestart);
    }
    Ok(first)
}

fn verify_search<P: Plugin + ?Sized>(
    plugin: &P,
    expectations: &PluginContractExpectations,
) -> Result<(), PluginContractError> {
    if !plugin.capabilities().supports_search() {
        if !plugin.search_categories().is_empty() {
            return Err(PluginContractError::UnadvertisedSearch);
        }
        return Ok(());
    }

    let search = expectations
        .search
        .as_ref()
        .ok_or(PluginContractError::MissingSearchExpectation)?;
    let request = CatalogRequest::search(&search.category, "", &search.query, None);
    let page = plugin.get_media_items(&request, None).map_err(failure)?;
    let first = page.items.first().ok_or_else(|| PluginContractError::EmptySearch {
        query: search.query.clone(),
    })?;
    if first.id() != search.expected_first_id.as_ref() {
        return Err(PluginContractError::SearchWrongFirstItem {
            expected: search.expected_first_id.clone(),
            actual: first.id().to_string(),
        });
    }
    Ok(())
}

fn verify_resolution<P: Plugin + ?Sized>(
    plugin: &P,
    listed: &[CatalogEntry],
) -> Result<(), PluginContractError> {
    let Some(item) = listed.iter().find_map(CatalogEntry::as_playable) else {
        return Ok(());
    };
    match resolver::resolve(plugin, item).map_err(failure)? {
        Resolution::Unchanged(uri) | Resolution::Uri(uri) if uri.trim().is_empty() => {
            Err(PluginContractError::EmptyResolution {
                id: item.id.to_string(),
            })
        }
        _ => Ok(()),
    }
}

fn verify_unsupported<P: Plugin + ?Sized>(plugin: &P) -> Result<(), PluginContractError> {
    let caps = plugin.capabilities();
    let probe = MediaId::new(format!("{}|contract-probe", plugin.name()));

    if !caps.supports_favorites() && !is_not_supported(plugin.favorite(&probe)) {
        return Err(PluginContractError::NotSupportedExpected {
            operation: "favorite".into(),
        });
    }
    if !caps.supports_suggestions() && !is_not_supported(plugin.get_suggestions("", "probe")) {
        return Err(PluginContractError::NotSupportedExpected {
            operation: "get_suggestions".into(),
        });
    }
    Ok(())
}

fn is_not_supported<T>(result: Result<T, PluginError>) -> bool {
    matches!(result, Err(PluginError::NotSupported { .. }))
}
