use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: PaginationMetadata,
}

pub type SongPagedResponse = PagedResponse<Song>;
pub type AlbumPagedResponse = PagedResponse<Album>;
pub type PlaylistPagedResponse = PagedResponse<Playlist>;

#[derive(Debug, Default, Deserialize)]
pub struct PaginationMetadata {
    #[serde(rename = "totalCount")]
    pub total_count: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
    #[serde(rename = "currentPage")]
    pub current_page: Option<u32>,
    #[serde(rename = "totalPages")]
    pub total_pages: Option<u32>,
    #[serde(rename = "hasNext")]
    pub has_next: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(rename = "durationMs", default)]
    pub duration_ms: Option<u64>,
    #[serde(rename = "streamUrl", default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub artist: Option<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(rename = "thumbnailUrl", default)]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(rename = "userStarred", default)]
    pub user_starred: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AlbumRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Playlist {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub name: String,
    #[serde(rename = "songsCount", default)]
    pub songs_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist: Option<ArtistRef>,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}
