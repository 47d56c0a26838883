use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the plugin name and the plugin-local part of a media id.
pub const MEDIA_ID_SEPARATOR: char = '|';

/// Command advertised by playable items that carry a rating.
pub const COMMAND_LIKE: &str = "COMMAND_LIKE";

/// A media identifier as handed out by a plugin.
///
/// Hosts usually namespace ids as `plugin|local-id`; plugins MUST keep the
/// local part stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct MediaId(pub String);

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id without its `plugin|` namespace, if any.
    pub fn local_part(&self) -> &str {
        match self.0.find(MEDIA_ID_SEPARATOR) {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }
}

impl AsRef<str> for MediaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for MediaId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Classification tag attached to every catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Media,
    Collection,
    Stream,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Media => "MEDIA",
            MediaType::Collection => "COLLECTION",
            MediaType::Stream => "STREAM",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MEDIA" => Ok(MediaType::Media),
            "COLLECTION" => Ok(MediaType::Collection),
            "STREAM" => Ok(MediaType::Stream),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// Heart-style rating; the only rating the host knows how to toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Rating {
    pub liked: bool,
}

/// An item the host can hand to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableItem {
    pub id: MediaId,
    /// Declared stream location. May be indirect and need resolution.
    pub uri: String,
    pub title: String,
    pub duration_ms: u64,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork_uri: Option<String>,
    pub waveform_url: Option<String>,
    /// Web page of the item on the remote service.
    pub url: Option<String>,
    pub rating: Option<Rating>,
    /// Name of the plugin that produced the item.
    pub plugin: Option<String>,
    /// Playback must go through [`crate::plugin::Plugin::get_data_source`].
    pub is_data_source: bool,
}

impl PlayableItem {
    pub fn new(
        id: impl Into<MediaId>,
        uri: impl Into<String>,
        title: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            title: title.into(),
            duration_ms,
            artist: None,
            album: None,
            artwork_uri: None,
            waveform_url: None,
            url: None,
            rating: None,
            plugin: None,
            is_data_source: false,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_artwork(mut self, artwork_uri: impl Into<String>) -> Self {
        self.artwork_uri = Some(artwork_uri.into());
        self
    }

    pub fn with_waveform(mut self, waveform_url: impl Into<String>) -> Self {
        self.waveform_url = Some(waveform_url.into());
        self
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn as_data_source(mut self) -> Self {
        self.is_data_source = true;
        self
    }

    /// Commands the host may offer for this item.
    pub fn supported_commands(&self) -> Vec<&'static str> {
        if self.rating.is_some() {
            vec![COMMAND_LIKE]
        } else {
            Vec::new()
        }
    }
}

/// A node the host can descend into (album, playlist, folder, station list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsableItem {
    pub id: MediaId,
    pub title: String,
    pub media_type: MediaType,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork_uri: Option<String>,
    pub duration_ms: Option<u64>,
    pub description: Option<String>,
}

impl BrowsableItem {
    pub fn new(id: impl Into<MediaId>, title: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            media_type,
            artist: None,
            album: None,
            artwork_uri: None,
            duration_ms: None,
            description: None,
        }
    }
}

/// Plain text entry, used for search suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    /// Came from the recent-queries history rather than from the plugin.
    pub from_recent: bool,
}

/// A single browsable or playable item a plugin can return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogEntry {
    Playable(PlayableItem),
    Browsable(BrowsableItem),
    Text(TextItem),
}

impl CatalogEntry {
    pub fn text(text: impl Into<String>, from_recent: bool) -> Self {
        CatalogEntry::Text(TextItem {
            text: text.into(),
            from_recent,
        })
    }

    /// Text entries use their text as id.
    pub fn id(&self) -> &str {
        match self {
            CatalogEntry::Playable(item) => item.id.as_ref(),
            CatalogEntry::Browsable(item) => item.id.as_ref(),
            CatalogEntry::Text(item) => &item.text,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CatalogEntry::Playable(item) => &item.title,
            CatalogEntry::Browsable(item) => &item.title,
            CatalogEntry::Text(item) => &item.text,
        }
    }

    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            CatalogEntry::Playable(_) => Some(MediaType::Media),
            CatalogEntry::Browsable(item) => Some(item.media_type),
            CatalogEntry::Text(_) => None,
        }
    }

    pub fn is_playable(&self) -> bool {
        matches!(self, CatalogEntry::Playable(_))
    }

    pub fn is_browsable(&self) -> bool {
        matches!(self, CatalogEntry::Browsable(_))
    }

    pub fn as_playable(&self) -> Option<&PlayableItem> {
        match self {
            CatalogEntry::Playable(item) => Some(item),
            _ => None,
        }
    }
}

impl From<PlayableItem> for CatalogEntry {
    fn from(value: PlayableItem) -> Self {
        CatalogEntry::Playable(value)
    }
}

impl From<BrowsableItem> for CatalogEntry {
    fn from(value: BrowsableItem) -> Self {
        CatalogEntry::Browsable(value)
    }
}

/// Persisted metadata snapshot for one media id.
///
/// Optional locators are never stored as empty strings; the builders map an
/// empty value to absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub duration_ms: u64,
    /// Canonical remote locator; unique across the store.
    pub source_uri: String,
    /// Unique across the store when present.
    #[serde(default, deserialize_with = "non_empty")]
    download_uri: Option<String>,
    /// May be empty.
    pub artwork_uri: String,
    #[serde(default, deserialize_with = "non_empty")]
    waveform_uri: Option<String>,
}

impl MediaRecord {
    pub fn new(
        id: impl Into<String>,
        artist: impl Into<String>,
        title: impl Into<String>,
        duration_ms: u64,
        source_uri: impl Into<String>,
        artwork_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            artist: artist.into(),
            title: title.into(),
            duration_ms,
            source_uri: source_uri.into(),
            download_uri: None,
            artwork_uri: artwork_uri.into(),
            waveform_uri: None,
        }
    }

    pub fn with_download(mut self, uri: impl Into<String>) -> Self {
        self.download_uri = Some(uri.into()).filter(|u| !u.is_empty());
        self
    }

    pub fn with_waveform(mut self, uri: impl Into<String>) -> Self {
        self.waveform_uri = Some(uri.into()).filter(|u| !u.is_empty());
        self
    }

    pub fn download_uri(&self) -> Option<&str> {
        self.download_uri.as_deref()
    }

    pub fn waveform_uri(&self) -> Option<&str> {
        self.waveform_uri.as_deref()
    }

    /// Snapshot of a plugin item, keyed by the plugin-local part of its id.
    pub fn from_playable(item: &PlayableItem) -> Self {
        let record = Self::new(
            item.id.local_part(),
            item.artist.clone().unwrap_or_default(),
            item.title.clone(),
            item.duration_ms,
            item.uri.clone(),
            item.artwork_uri.clone().unwrap_or_default(),
        );
        match &item.waveform_url {
            Some(waveform) => record.with_waveform(waveform.clone()),
            None => record,
        }
    }

    /// Rebuilds a playable item from a cached record. With a plugin name the
    /// id is namespaced again as `plugin|id`.
    pub fn to_playable(&self, plugin: Option<&str>) -> PlayableItem {
        let id = match plugin {
            Some(plugin) => format!("{plugin}{MEDIA_ID_SEPARATOR}{}", self.id),
            None => self.id.clone(),
        };
        PlayableItem {
            id: MediaId::new(id),
            uri: self.source_uri.clone(),
            title: self.title.clone(),
            duration_ms: self.duration_ms,
            artist: Some(self.artist.clone()).filter(|a| !a.is_empty()),
            album: None,
            artwork_uri: Some(self.artwork_uri.clone()).filter(|a| !a.is_empty()),
            waveform_url: self.waveform_uri.clone(),
            url: None,
            rating: None,
            plugin: plugin.map(str::to_string),
            is_data_source: false,
        }
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

/// Opaque continuation position of a paged listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageCursor {
    Offset(u32),
    Token(String),
}

impl PageCursor {
    pub fn offset(&self) -> Option<u32> {
        match self {
            PageCursor::Offset(offset) => Some(*offset),
            PageCursor::Token(_) => None,
        }
    }
}

/// A single page of items plus an optional cursor for continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn single_page(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }

    /// Slices `all` at `cursor` (offset cursors only; tokens start from zero).
    pub fn slice_of(all: Vec<T>, cursor: Option<&PageCursor>, limit: u32) -> Self {
        let start = cursor.and_then(PageCursor::offset).unwrap_or(0) as usize;
        let total = all.len();
        let end = start.saturating_add(limit as usize);
        let items = all
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect::<Vec<_>>();
        let next = if end < total {
            Some(PageCursor::Offset(end as u32))
        } else {
            None
        };
        Self { items, next }
    }
}
