use crate::tags::parse_tags;
use path_clean::PathClean;
use soundcrowd_core::plugin::{PluginError, PluginResult};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    /// Canonical location; doubles as the plugin-local id.
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LibraryIndex {
    pub roots: Vec<PathBuf>,
    pub tracks: Vec<LocalTrack>,
}

/// Immediate content of a folder.
#[derive(Debug, Default)]
pub struct FolderListing<'a> {
    pub folders: Vec<PathBuf>,
    pub tracks: Vec<&'a LocalTrack>,
}

impl LibraryIndex {
    /// Cleans `dir` and checks it lies inside one of the roots.
    pub fn folder(&self, dir: &str) -> Option<PathBuf> {
        let cleaned = PathBuf::from(dir).clean();
        self.roots
            .iter()
            .any(|root| cleaned.starts_with(root))
            .then_some(cleaned)
    }

    /// Subfolders holding music, then tracks directly inside `dir`.
    pub fn list_folder(&self, dir: &Path) -> FolderListing<'_> {
        let mut folders = BTreeSet::new();
        let mut tracks = Vec::new();
        for track in &self.tracks {
            let Ok(relative) = track.path.strip_prefix(dir) else {
                continue;
            };
            let mut components = relative.components();
            let first = components.next();
            match (first, components.next()) {
                (Some(_), None) => tracks.push(track),
                (Some(sub), Some(_)) => {
                    folders.insert(dir.join(sub));
                }
                (None, _) => {}
            }
        }
        FolderListing {
            folders: folders.into_iter().collect(),
            tracks,
        }
    }
}

fn canonicalize_within_root(path: &Path, root: &Path) -> Option<PathBuf> {
    let Ok(canon) = path.canonicalize() else {
        return None;
    };
    let cleaned = canon.clean();
    if cleaned.starts_with(root) {
        Some(cleaned)
    } else {
        None
    }
}

pub fn scan_library(roots: &[PathBuf]) -> PluginResult<LibraryIndex> {
    let mut index = LibraryIndex::default();
    for root in roots {
        let root_path = match root.canonicalize() {
            Ok(canon) => canon.clean(),
            Err(err) => {
                tracing::warn!(root = %root.display(), "skipping library root: {err}");
                continue;
            }
        };
        for entry in WalkDir::new(&root_path).follow_links(false) {
            let entry = entry.map_err(|e| PluginError::Other {
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let supported = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(is_supported_extension);
            if !supported {
                continue;
            }
            if let Some(track) = parse_track(path, &root_path) {
                index.tracks.push(track);
            }
        }
        tracing::debug!(root = %root_path.display(), "scanned library root");
        index.roots.push(root_path);
    }
    index
        .tracks
        .sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.path.cmp(&b.path)));
    tracing::info!(tracks = index.tracks.len(), "library scan complete");
    Ok(index)
}

fn is_supported_extension(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "mp3" | "m4a" | "flac" | "wav" | "ogg" | "opus"
    )
}

fn parse_track(path: &Path, root: &Path) -> Option<LocalTrack> {
    let canonical = canonicalize_within_root(path, root)?;
    let relative = canonical.strip_prefix(root).ok()?;

    let mut folders: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect();
    // Artist/Album/track layout
    let (inferred_artist, inferred_album) = match folders.len() {
        0 => ("Unknown Artist".to_string(), None),
        1 => (folders.remove(0), None),
        n => {
            let album = folders.remove(n - 1);
            (folders.remove(n - 2), Some(album))
        }
    };

    let file_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown");

    let tags = parse_tags(path);
    Some(LocalTrack {
        title: tags.title.unwrap_or_else(|| file_stem.to_string()),
        artist: tags.artist.unwrap_or(inferred_artist),
        album: tags.album.or(inferred_album),
        duration_ms: tags.duration_ms.unwrap_or(0),
        path: canonical,
    })
}
