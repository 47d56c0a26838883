use crate::models::{Album, PaginationMetadata, Playlist, Song};
use crate::PLUGIN_NAME;
use soundcrowd_core::models::{
    BrowsableItem, CatalogEntry, MediaId, MediaType, PageCursor, PlayableItem, Rating,
    MEDIA_ID_SEPARATOR,
};

/// Scheme of the indirect uri listed for songs; exchanged for a stream uri on play.
pub const SONG_URI_PREFIX: &str = "melodee://song/";

fn media_id(local: &str) -> MediaId {
    MediaId::new(format!("{PLUGIN_NAME}{MEDIA_ID_SEPARATOR}{local}"))
}

pub fn map_song(song: &Song, buffered: bool) -> PlayableItem {
    let artist = song
        .artist
        .as_ref()
        .map(|a| a.name.clone())
        .unwrap_or_else(|| "Unknown Artist".into());
    let mut item = PlayableItem::new(
        media_id(&song.id),
        format!("{SONG_URI_PREFIX}{}", song.id),
        song.title.clone(),
        song.duration_ms.unwrap_or(0),
    )
    .with_artist(artist)
    .with_plugin(PLUGIN_NAME)
    .with_rating(Rating {
        liked: song.user_starred.unwrap_or(false),
    });
    if let Some(album) = &song.album {
        item = item.with_album(album.name.clone());
    }
    if let Some(art) = song.image_url.as_ref().or(song.thumbnail_url.as_ref()) {
        item = item.with_artwork(art.clone());
    }
    if buffered {
        item = item.as_data_source();
    }
    item
}

pub fn map_album(album: &Album) -> CatalogEntry {
    let mut entry =
        BrowsableItem::new(media_id(&album.id), album.name.clone(), MediaType::Collection);
    entry.artist = album.artist.as_ref().map(|a| a.name.clone());
    entry.artwork_uri = album.image_url.clone();
    entry.into()
}

pub fn map_playlist(playlist: &Playlist) -> CatalogEntry {
    let title = match playlist.songs_count {
        Some(count) => format!("{} ({count})", playlist.name),
        None => playlist.name.clone(),
    };
    BrowsableItem::new(media_id(&playlist.api_key), title, MediaType::Collection).into()
}

/// Cursor of the page after `page`, judged from the response metadata.
pub fn next_cursor(
    meta: &PaginationMetadata,
    page: u32,
    returned: usize,
    page_size: u32,
) -> Option<PageCursor> {
    let has_next = meta.has_next.unwrap_or_else(|| match meta.total_pages {
        Some(total) => page < total,
        None => returned >= page_size as usize,
    });
    (has_next && returned > 0).then(|| PageCursor::Token((page + 1).to_string()))
}

/// Page number a cursor points at; listings start at page 1.
pub fn page_of(cursor: Option<&PageCursor>) -> u32 {
    match cursor {
        Some(PageCursor::Token(token)) => token.parse().unwrap_or(1),
        Some(PageCursor::Offset(_)) | None => 1,
    }
}
