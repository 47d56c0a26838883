mod scan;
mod tags;

use scan::{scan_library, LibraryIndex, LocalTrack};
use soundcrowd_core::models::{
    BrowsableItem, CatalogEntry, MediaId, MediaType, Page, PageCursor, PlayableItem,
    MEDIA_ID_SEPARATOR,
};
use soundcrowd_core::plugin::{
    CatalogRequest, Plugin, PluginCapabilities, PluginError, PluginResult,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use url::Url;

pub const PLUGIN_NAME: &str = "filesystem";
pub const CATEGORY_FOLDERS: &str = "Folders";
pub const CATEGORY_TRACKS: &str = "Tracks";

const MAX_SUGGESTIONS: usize = 10;

/// Local music library.
///
/// Files are served by `file://` uri, so resolution is a pass-through.
#[derive(Clone, Debug)]
pub struct FilesystemPlugin {
    roots: Vec<PathBuf>,
    page_size: u32,
    index: Arc<RwLock<LibraryIndex>>,
}

impl FilesystemPlugin {
    pub fn new(roots: Vec<PathBuf>, page_size: u32) -> PluginResult<Self> {
        let index = scan_library(&roots)?;
        Ok(Self {
            roots,
            page_size: page_size.max(1),
            index: Arc::new(RwLock::new(index)),
        })
    }

    /// Walks the roots again and swaps in the new index.
    pub fn rescan(&self) -> PluginResult<usize> {
        let fresh = scan_library(&self.roots)?;
        let count = fresh.tracks.len();
        let mut index = self.index.write().map_err(|_| poisoned())?;
        *index = fresh;
        Ok(count)
    }

    fn index(&self) -> PluginResult<RwLockReadGuard<'_, LibraryIndex>> {
        self.index.read().map_err(|_| poisoned())
    }

    fn folder_entries(&self, index: &LibraryIndex, path: Option<&str>) -> PluginResult<Vec<CatalogEntry>> {
        let dir = match path.filter(|p| !p.is_empty()) {
            Some(path) => index.folder(path).ok_or_else(|| PluginError::NotFound {
                entity: path.to_string(),
            })?,
            None => match index.roots.as_slice() {
                [single] => single.clone(),
                roots => return Ok(roots.iter().map(|r| folder_entry(r)).collect()),
            },
        };

        let listing = index.list_folder(&dir);
        let mut entries: Vec<CatalogEntry> =
            listing.folders.iter().map(|f| folder_entry(f)).collect();
        entries.extend(listing.tracks.into_iter().map(|t| track_entry(t).into()));
        Ok(entries)
    }

    fn search_entries(
        &self,
        index: &LibraryIndex,
        request: &CatalogRequest,
        query: &str,
    ) -> PluginResult<Vec<CatalogEntry>> {
        let scope = match request.path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Some(index.folder(path).ok_or_else(|| PluginError::NotFound {
                entity: path.to_string(),
            })?),
            None => None,
        };
        let needle = query.to_lowercase();
        let field = request.search_type.as_deref();
        Ok(index
            .tracks
            .iter()
            .filter(|t| scope.as_deref().map_or(true, |dir| t.path.starts_with(dir)))
            .filter(|t| matches_query(t, &needle, field))
            .map(|t| track_entry(t).into())
            .collect())
    }
}

fn poisoned() -> PluginError {
    PluginError::Other {
        message: "library index lock poisoned".into(),
    }
}

fn media_id(path: &Path) -> MediaId {
    MediaId::new(format!("{PLUGIN_NAME}{MEDIA_ID_SEPARATOR}{}", path.display()))
}

fn file_uri(path: &Path) -> String {
    Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|_| format!("file://{}", path.display()))
}

fn folder_entry(path: &Path) -> CatalogEntry {
    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    BrowsableItem::new(media_id(path), title, MediaType::Collection).into()
}

fn track_entry(track: &LocalTrack) -> PlayableItem {
    let item = PlayableItem::new(
        media_id(&track.path),
        file_uri(&track.path),
        track.title.clone(),
        track.duration_ms,
    )
    .with_artist(track.artist.clone())
    .with_plugin(PLUGIN_NAME);
    match &track.album {
        Some(album) => item.with_album(album.clone()),
        None => item,
    }
}

fn matches_query(track: &LocalTrack, needle: &str, field: Option<&str>) -> bool {
    let hit = |value: &str| value.to_lowercase().contains(needle);
    match field {
        Some("title") => hit(&track.title),
        Some("artist") => hit(&track.artist),
        Some("album") => track.album.as_deref().is_some_and(hit),
        _ => hit(&track.title) || hit(&track.artist) || track.album.as_deref().is_some_and(hit),
    }
}

impl Plugin for FilesystemPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn media_categories(&self) -> Vec<String> {
        vec![CATEGORY_FOLDERS.into(), CATEGORY_TRACKS.into()]
    }

    fn search_categories(&self) -> Vec<String> {
        vec![CATEGORY_TRACKS.into()]
    }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            search: true,
            suggestions: true,
            ..PluginCapabilities::default()
        }
    }

    fn get_media_items(
        &self,
        request: &CatalogRequest,
        cursor: Option<&PageCursor>,
    ) -> PluginResult<Page<CatalogEntry>> {
        let index = self.index()?;
        let entries = match (request.category.as_str(), request.query.as_deref()) {
            (_, Some(query)) => self.search_entries(&index, request, query)?,
            (CATEGORY_FOLDERS, None) => self.folder_entries(&index, request.path.as_deref())?,
            (CATEGORY_TRACKS, None) => index
                .tracks
                .iter()
                .map(|t| track_entry(t).into())
                .collect(),
            (other, None) => {
                return Err(PluginError::NotFound {
                    entity: format!("category {other}"),
                })
            }
        };
        Ok(Page::slice_of(entries, cursor, self.page_size))
    }

    fn get_suggestions(&self, _category: &str, query: &str) -> PluginResult<Vec<String>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.index()?;
        let suggestions: BTreeSet<&str> = index
            .tracks
            .iter()
            .flat_map(|t| [t.title.as_str(), t.artist.as_str()])
            .filter(|s| s.to_lowercase().starts_with(&needle))
            .collect();
        Ok(suggestions
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundcrowd_core::pagination::Paginator;
    use soundcrowd_core::plugin_contract::{
        run_plugin_contract, PluginContractExpectations, SearchExpectation,
    };
    use soundcrowd_core::resolver::{resolve, resolve_uri, Resolution};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn library() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        for (folder, files) in [
            ("Band/Debut", &["Alpha", "Bravo", "Charlie"][..]),
            ("Band/Second", &["Delta"][..]),
            ("Solo", &["Echo", "Foxtrot"][..]),
        ] {
            let folder = dir.path().join(folder);
            fs::create_dir_all(&folder).unwrap();
            for file in files {
                fs::write(folder.join(format!("{file}.mp3")), b"not audio").unwrap();
            }
        }
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    fn ids(entries: &[CatalogEntry]) -> Vec<String> {
        entries.iter().map(|e| e.title().to_string()).collect()
    }

    #[test]
    fn contract_suite_passes() {
        let (_dir, root) = library();
        let plugin = FilesystemPlugin::new(vec![root.clone()], 2).unwrap();
        let expectations = PluginContractExpectations {
            plugin_name: PLUGIN_NAME.into(),
            listing: CatalogRequest::category(CATEGORY_TRACKS),
            search: Some(SearchExpectation {
                category: CATEGORY_TRACKS.into(),
                query: "delta".into(),
                expected_first_id: media_id(&root.join("Band/Second/Delta.mp3")),
            }),
        };
        let result = run_plugin_contract(&plugin, &expectations);
        assert!(result.is_ok(), "expected contract to pass: {result:?}");
    }

    #[test]
    fn tracks_page_through_the_whole_library() {
        let (_dir, root) = library();
        let plugin = FilesystemPlugin::new(vec![root], 4).unwrap();
        let mut pages = Paginator::new();
        let key = CatalogRequest::category(CATEGORY_TRACKS);

        let first = pages.request(&plugin, &key, false).unwrap();
        let second = pages.request(&plugin, &key, false).unwrap();
        let third = pages.request(&plugin, &key, false).unwrap();
        assert_eq!(ids(&first), ["Alpha", "Bravo", "Charlie", "Delta"]);
        assert_eq!(ids(&second), ["Echo", "Foxtrot"]);
        assert!(third.is_empty());
    }

    #[test]
    fn folders_browse_by_path() {
        let (_dir, root) = library();
        let plugin = FilesystemPlugin::new(vec![root.clone()], 50).unwrap();

        let top = plugin
            .get_media_items(&CatalogRequest::category(CATEGORY_FOLDERS), None)
            .unwrap();
        assert_eq!(ids(&top.items), ["Band", "Solo"]);
        assert!(top.items.iter().all(CatalogEntry::is_browsable));

        let band = MediaId::new(top.items[0].id());
        let request = CatalogRequest::at_path(CATEGORY_FOLDERS, band.local_part());
        let inside = plugin.get_media_items(&request, None).unwrap();
        assert_eq!(ids(&inside.items), ["Debut", "Second"]);

        let debut = root.join("Band/Debut");
        let request = CatalogRequest::at_path(CATEGORY_FOLDERS, debut.to_string_lossy());
        let tracks = plugin.get_media_items(&request, None).unwrap();
        assert_eq!(ids(&tracks.items), ["Alpha", "Bravo", "Charlie"]);
        let alpha = tracks.items[0].as_playable().unwrap();
        assert_eq!(alpha.artist.as_deref(), Some("Band"));
        assert_eq!(alpha.album.as_deref(), Some("Debut"));
        assert!(alpha.uri.starts_with("file://"));
    }

    #[test]
    fn paths_outside_library_are_not_found() {
        let (_dir, root) = library();
        let plugin = FilesystemPlugin::new(vec![root.join("Solo")], 50).unwrap();
        let request = CatalogRequest::at_path(CATEGORY_FOLDERS, root.to_string_lossy());
        assert!(matches!(
            plugin.get_media_items(&request, None),
            Err(PluginError::NotFound { .. })
        ));
    }

    #[test]
    fn search_respects_type_and_scope() {
        let (_dir, root) = library();
        let plugin = FilesystemPlugin::new(vec![root.clone()], 50).unwrap();

        let by_artist = CatalogRequest::search(CATEGORY_TRACKS, "", "solo", Some("artist".into()));
        let found = plugin.get_media_items(&by_artist, None).unwrap();
        assert_eq!(ids(&found.items), ["Echo", "Foxtrot"]);

        let by_title = CatalogRequest::search(CATEGORY_TRACKS, "", "solo", Some("title".into()));
        assert!(plugin.get_media_items(&by_title, None).unwrap().items.is_empty());

        let scoped = CatalogRequest::search(
            CATEGORY_TRACKS,
            root.join("Band/Second").to_string_lossy(),
            "band",
            None,
        );
        let found = plugin.get_media_items(&scoped, None).unwrap();
        assert_eq!(ids(&found.items), ["Delta"]);
    }

    #[test]
    fn suggestions_match_prefixes() {
        let (_dir, root) = library();
        let plugin = FilesystemPlugin::new(vec![root], 50).unwrap();
        assert_eq!(plugin.get_suggestions(CATEGORY_TRACKS, "b").unwrap(), ["Band", "Bravo"]);
        assert!(plugin.get_suggestions(CATEGORY_TRACKS, " ").unwrap().is_empty());
    }

    #[test]
    fn direct_uris_resolve_to_themselves() {
        let (_dir, root) = library();
        let plugin = FilesystemPlugin::new(vec![root], 50).unwrap();
        let page = plugin
            .get_media_items(&CatalogRequest::category(CATEGORY_TRACKS), None)
            .unwrap();
        let item = page.items[0].as_playable().unwrap();
        let resolved = resolve(&plugin, item).unwrap();
        assert!(matches!(resolved, Resolution::Unchanged(ref uri) if *uri == item.uri));

        let remote = PlayableItem::new("filesystem|/nowhere", "https://x/y.mp3", "Y", 0);
        assert!(matches!(
            resolve(&plugin, &remote).unwrap(),
            Resolution::Unchanged(ref uri) if uri == "https://x/y.mp3"
        ));
        assert!(matches!(
            resolve_uri(&plugin, "https://cdn.example/a.mp3").unwrap(),
            Resolution::Unchanged(ref uri) if uri == "https://cdn.example/a.mp3"
        ));
    }

    #[test]
    fn rescan_picks_up_new_files() {
        let (dir, root) = library();
        let plugin = FilesystemPlugin::new(vec![root], 50).unwrap();
        fs::write(dir.path().join("Solo/Golf.mp3"), b"not audio").unwrap();
        assert_eq!(plugin.rescan().unwrap(), 7);
    }
}
