mod mapping;
pub mod models;

use mapping::{map_album, map_playlist, map_song, next_cursor, page_of, SONG_URI_PREFIX};
use serde::de::DeserializeOwned;
use soundcrowd_core::config::MelodeePluginConfig;
use soundcrowd_core::models::{CatalogEntry, MediaId, Page, PageCursor, PlayableItem};
use soundcrowd_core::plugin::{
    CatalogRequest, Plugin, PluginCapabilities, PluginError, PluginResult, Preference,
};
use soundcrowd_core::resolver::{DataSource, MemoryDataSource};
use soundcrowd_core::transport::{HttpRequest, HttpResponse, Transport};
use std::sync::{Arc, RwLock};
use url::Url;

pub const PLUGIN_NAME: &str = "melodee";
pub const CATEGORY_SONGS: &str = "Songs";
pub const CATEGORY_ALBUMS: &str = "Albums";
pub const CATEGORY_PLAYLISTS: &str = "Playlists";

const SUGGESTION_LIMIT: u32 = 10;

/// Client of a Melodee server's JSON API.
#[derive(Clone)]
pub struct MelodeePlugin {
    transport: Arc<dyn Transport>,
    base_url: Url,
    access_token: Arc<RwLock<Option<String>>>,
    page_size: u32,
    buffer_streams: bool,
}

impl MelodeePlugin {
    pub fn new(config: &MelodeePluginConfig, transport: Arc<dyn Transport>) -> PluginResult<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| PluginError::Other {
            message: format!("invalid base_url: {e}"),
        })?;
        Ok(Self {
            transport,
            base_url,
            access_token: Arc::new(RwLock::new(config.access_token.clone())),
            page_size: config.page_size.max(1),
            buffer_streams: config.buffer_streams,
        })
    }

    pub fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn auth_header(&self) -> Option<String> {
        match self.access_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> PluginResult<Url> {
        let mut url = self.base_url.join(path).map_err(|e| PluginError::Other {
            message: e.to_string(),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn send(&self, request: HttpRequest) -> PluginResult<HttpResponse> {
        let request = match self.auth_header() {
            Some(token) => request.bearer_auth(&token),
            None => request,
        };
        Ok(self.transport.request(&request)?)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> PluginResult<T> {
        let url = self.url(path, query)?;
        let response = self.send(HttpRequest::get(url).with_header("Accept", "application/json"))?;
        response.json().map_err(|e| PluginError::Other {
            message: format!("unexpected response from {path}: {e}"),
        })
    }

    fn paged<T: DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
        cursor: Option<&PageCursor>,
        map: impl Fn(&T) -> CatalogEntry,
    ) -> PluginResult<Page<CatalogEntry>> {
        let page = page_of(cursor);
        query.push(("page", page.to_string()));
        query.push(("pageSize", self.page_size.to_string()));
        let body: models::PagedResponse<T> = self.get_json(path, &query)?;
        let next = next_cursor(&body.meta, page, body.data.len(), self.page_size);
        tracing::debug!(path, page, items = body.data.len(), "melodee page");
        Ok(Page {
            items: body.data.iter().map(map).collect(),
            next,
        })
    }

    fn song_entry(&self) -> impl Fn(&models::Song) -> CatalogEntry + '_ {
        move |song: &models::Song| map_song(song, self.buffer_streams).into()
    }

    fn get_song(&self, id: &str) -> PluginResult<models::Song> {
        self.get_json(&format!("api/v1/songs/{id}"), &[])
            .map_err(|err| match err {
                PluginError::UpstreamHttp { status: 404, .. } => PluginError::NotFound {
                    entity: format!("song {id}"),
                },
                other => other,
            })
    }

    /// Exchanges an indirect song uri for the server's current stream url.
    fn stream_url(&self, item: &PlayableItem) -> PluginResult<Option<String>> {
        let Some(song_id) = item.uri.strip_prefix(SONG_URI_PREFIX) else {
            return Ok(None);
        };
        let song = self.get_song(song_id).map_err(|err| match err {
            err @ (PluginError::Transport { .. } | PluginError::UpstreamHttp { .. }) => err,
            other => PluginError::resolution(format!("song {song_id}: {other}")),
        })?;
        match song.stream_url.filter(|u| !u.is_empty()) {
            Some(url) => Ok(Some(url)),
            None => Err(PluginError::resolution(format!(
                "song {song_id} has no stream url"
            ))),
        }
    }
}

impl Plugin for MelodeePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn media_categories(&self) -> Vec<String> {
        vec![
            CATEGORY_SONGS.into(),
            CATEGORY_ALBUMS.into(),
            CATEGORY_PLAYLISTS.into(),
        ]
    }

    fn search_categories(&self) -> Vec<String> {
        vec![CATEGORY_SONGS.into()]
    }

    fn preferences(&self) -> Vec<Preference> {
        vec![
            Preference {
                key: "base_url".into(),
                name: "Server".into(),
                description: "Base url of the Melodee server".into(),
                default_value: Some(self.base_url.to_string()),
            },
            Preference {
                key: "access_token".into(),
                name: "Access token".into(),
                description: "Bearer token of the Melodee account".into(),
                default_value: None,
            },
        ]
    }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            search: true,
            favorites: true,
            suggestions: true,
            url_resolution: true,
            data_source: self.buffer_streams,
        }
    }

    fn get_media_items(
        &self,
        request: &CatalogRequest,
        cursor: Option<&PageCursor>,
    ) -> PluginResult<Page<CatalogEntry>> {
        let path = request.path.as_deref().filter(|p| !p.is_empty());
        match (request.category.as_str(), path, request.query.as_deref()) {
            (_, _, Some(query)) => self.paged(
                "api/v1/search/songs",
                vec![("q", query.to_string())],
                cursor,
                self.song_entry(),
            ),
            (CATEGORY_SONGS, _, None) => {
                self.paged("api/v1/songs", Vec::new(), cursor, self.song_entry())
            }
            (CATEGORY_ALBUMS, None, None) => {
                self.paged("api/v1/albums", Vec::new(), cursor, map_album)
            }
            (CATEGORY_ALBUMS, Some(album), None) => self.paged(
                &format!("api/v1/albums/{album}/songs"),
                Vec::new(),
                cursor,
                self.song_entry(),
            ),
            (CATEGORY_PLAYLISTS, None, None) => {
                self.paged("api/v1/user/playlists", Vec::new(), cursor, map_playlist)
            }
            (CATEGORY_PLAYLISTS, Some(playlist), None) => self.paged(
                &format!("api/v1/playlists/{playlist}/songs"),
                Vec::new(),
                cursor,
                self.song_entry(),
            ),
            (other, _, None) => Err(PluginError::NotFound {
                entity: format!("category {other}"),
            }),
        }
    }

    fn favorite(&self, id: &MediaId) -> PluginResult<bool> {
        let song_id = id.local_part();
        let starred = !self.get_song(song_id)?.user_starred.unwrap_or(false);
        let url = self.url(&format!("api/v1/songs/starred/{song_id}/{starred}"), &[])?;
        self.send(HttpRequest::post(url, Vec::new()))?;
        tracing::info!(song = song_id, starred, "updated favorite");
        Ok(starred)
    }

    fn get_suggestions(&self, _category: &str, query: &str) -> PluginResult<Vec<String>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let body: models::SongPagedResponse = self.get_json(
            "api/v1/search/songs",
            &[
                ("q", query.trim().to_string()),
                ("page", "1".into()),
                ("pageSize", SUGGESTION_LIMIT.to_string()),
            ],
        )?;
        let mut titles: Vec<String> = Vec::new();
        for song in body.data {
            if !titles.contains(&song.title) {
                titles.push(song.title);
            }
        }
        Ok(titles)
    }

    fn get_media_uri(&self, item: &PlayableItem) -> PluginResult<Option<String>> {
        self.stream_url(item)
    }

    fn get_data_source(&self, item: &PlayableItem) -> PluginResult<Option<Box<dyn DataSource>>> {
        if !self.buffer_streams {
            return Ok(None);
        }
        let url = self.stream_url(item)?.unwrap_or_else(|| item.uri.clone());
        let response = self.send(HttpRequest::get(url)).map_err(|err| match err {
            PluginError::UpstreamHttp { status, .. } => {
                PluginError::resolution(format!("stream download failed with HTTP {status}"))
            }
            other => other,
        })?;
        tracing::debug!(id = %item.id, bytes = response.body.len(), "buffered stream");
        Ok(Some(Box::new(MemoryDataSource::new(response.body))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use soundcrowd_core::pagination::Paginator;
    use soundcrowd_core::plugin_contract::{
        run_plugin_contract, PluginContractExpectations, SearchExpectation,
    };
    use soundcrowd_core::resolver::{resolve, Resolution};
    use soundcrowd_core::transport::{HttpMethod, TransportError, TransportResult};
    use std::sync::Mutex;

    /// Answers by url fragment; the most recently added matching route wins.
    #[derive(Default)]
    struct FakeTransport {
        routes: Mutex<Vec<(String, TransportResult<HttpResponse>)>>,
        log: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        fn json(&self, fragment: &str, body: Value) {
            self.raw(fragment, 200, serde_json::to_vec(&body).unwrap());
        }

        fn raw(&self, fragment: &str, status: u16, body: Vec<u8>) {
            let result = if status >= 400 {
                Err(TransportError::Http {
                    status,
                    body: String::from_utf8_lossy(&body).into_owned(),
                })
            } else {
                Ok(HttpResponse::new(status, body))
            };
            self.routes.lock().unwrap().push((fragment.into(), result));
        }

        fn fail(&self, fragment: &str) {
            self.routes.lock().unwrap().push((
                fragment.into(),
                Err(TransportError::Io {
                    message: "connection reset".into(),
                }),
            ));
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Transport for FakeTransport {
        fn request(&self, request: &HttpRequest) -> TransportResult<HttpResponse> {
            self.log.lock().unwrap().push(request.clone());
            self.routes
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                .map(|(_, result)| result.clone())
                .unwrap_or_else(|| {
                    Err(TransportError::Http {
                        status: 404,
                        body: format!("no route for {}", request.url),
                    })
                })
        }
    }

    fn song(id: &str, title: &str, starred: bool) -> Value {
        json!({
            "id": id,
            "title": title,
            "durationMs": 200_000,
            "streamUrl": format!("https://melodee.example/stream/{id}"),
            "artist": { "id": "ar1", "name": "Artist" },
            "album": { "id": "al1", "name": "Album" },
            "userStarred": starred,
        })
    }

    fn page(data: Vec<Value>, has_next: bool) -> Value {
        json!({ "data": data, "meta": { "hasNext": has_next } })
    }

    fn plugin(transport: &Arc<FakeTransport>, buffer_streams: bool) -> MelodeePlugin {
        let config = MelodeePluginConfig {
            base_url: "https://melodee.example".into(),
            access_token: Some("tok".into()),
            page_size: 2,
            buffer_streams,
        };
        MelodeePlugin::new(&config, transport.clone()).unwrap()
    }

    fn library() -> Arc<FakeTransport> {
        let transport = Arc::new(FakeTransport::default());
        transport.json(
            "api/v1/songs?page=1&",
            page(vec![song("s1", "One", false), song("s2", "Two", false)], true),
        );
        transport.json(
            "api/v1/songs?page=2&",
            page(vec![song("s3", "Three", true), song("s4", "Four", false)], true),
        );
        transport.json("api/v1/songs?page=3&", page(vec![song("s5", "Five", false)], false));
        transport.json("api/v1/search/songs?q=three", page(vec![song("s3", "Three", true)], false));
        for id in ["s1", "s2", "s3", "s4", "s5"] {
            transport.json(&format!("api/v1/songs/{id}"), song(id, id, id == "s3"));
        }
        transport
    }

    fn titles(entries: &[CatalogEntry]) -> Vec<&str> {
        entries.iter().map(CatalogEntry::title).collect()
    }

    #[test]
    fn contract_suite_passes() {
        let transport = library();
        let expectations = PluginContractExpectations {
            plugin_name: PLUGIN_NAME.into(),
            listing: CatalogRequest::category(CATEGORY_SONGS),
            search: Some(SearchExpectation {
                category: CATEGORY_SONGS.into(),
                query: "three".into(),
                expected_first_id: MediaId::new("melodee|s3"),
            }),
        };
        let result = run_plugin_contract(&plugin(&transport, false), &expectations);
        assert!(result.is_ok(), "expected contract to pass: {result:?}");
    }

    #[test]
    fn listing_follows_has_next_and_stops() {
        let transport = library();
        let plugin = plugin(&transport, false);
        let mut pages = Paginator::new();
        let key = CatalogRequest::category(CATEGORY_SONGS);

        assert_eq!(titles(&pages.request(&plugin, &key, false).unwrap()), ["One", "Two"]);
        assert_eq!(titles(&pages.request(&plugin, &key, false).unwrap()), ["Three", "Four"]);
        assert_eq!(titles(&pages.request(&plugin, &key, false).unwrap()), ["Five"]);
        assert!(pages.request(&plugin, &key, false).unwrap().is_empty());
        assert_eq!(transport.requests().len(), 3);

        let first = &transport.requests()[0];
        assert_eq!(first.url, "https://melodee.example/api/v1/songs?page=1&pageSize=2");
        assert!(first
            .headers
            .contains(&("Authorization".to_string(), "Bearer tok".to_string())));
    }

    #[test]
    fn albums_and_playlists_browse_into_songs() {
        let transport = library();
        transport.json(
            "api/v1/albums?page=1&",
            page(vec![json!({ "id": "al1", "name": "Album", "artist": { "name": "Artist" } })], false),
        );
        transport.json("api/v1/albums/al1/songs?page=1&", page(vec![song("s1", "One", false)], false));
        transport.json(
            "api/v1/user/playlists?page=1&",
            page(vec![json!({ "apiKey": "pl1", "name": "Mix", "songsCount": 2 })], false),
        );
        transport.json(
            "api/v1/playlists/pl1/songs?page=1&",
            page(vec![song("s2", "Two", false), song("s4", "Four", false)], false),
        );
        let plugin = plugin(&transport, false);

        let albums = plugin
            .get_media_items(&CatalogRequest::category(CATEGORY_ALBUMS), None)
            .unwrap();
        assert!(albums.items[0].is_browsable());
        assert_eq!(albums.items[0].id(), "melodee|al1");
        let album_id = MediaId::new(albums.items[0].id());
        let songs = plugin
            .get_media_items(&CatalogRequest::at_path(CATEGORY_ALBUMS, album_id.local_part()), None)
            .unwrap();
        assert_eq!(titles(&songs.items), ["One"]);

        let playlists = plugin
            .get_media_items(&CatalogRequest::category(CATEGORY_PLAYLISTS), None)
            .unwrap();
        assert_eq!(titles(&playlists.items), ["Mix (2)"]);
        let songs = plugin
            .get_media_items(&CatalogRequest::at_path(CATEGORY_PLAYLISTS, "pl1"), None)
            .unwrap();
        assert_eq!(titles(&songs.items), ["Two", "Four"]);
        assert_eq!(songs.next, None);
    }

    #[test]
    fn resolution_exchanges_indirect_uris() {
        let transport = library();
        let plugin = plugin(&transport, false);
        let listed = map_song(&serde_json::from_value(song("s1", "One", false)).unwrap(), false);

        let resolved = resolve(&plugin, &listed).unwrap();
        assert!(matches!(resolved, Resolution::Uri(ref uri) if uri == "https://melodee.example/stream/s1"));

        let calls = transport.requests().len();
        let direct = PlayableItem::new("melodee|x", "https://melodee.example/stream/x", "X", 0);
        assert!(matches!(resolve(&plugin, &direct).unwrap(), Resolution::Unchanged(_)));
        assert_eq!(transport.requests().len(), calls);
    }

    #[test]
    fn resolution_failures_are_typed() {
        let transport = library();
        let plugin = plugin(&transport, false);

        let missing = PlayableItem::new("melodee|gone", "melodee://song/gone", "Gone", 0);
        assert!(matches!(
            plugin.get_media_uri(&missing),
            Err(PluginError::Resolution { .. })
        ));

        transport.json("api/v1/songs/nostream", json!({ "id": "nostream", "title": "N" }));
        let silent = PlayableItem::new("melodee|nostream", "melodee://song/nostream", "N", 0);
        assert!(matches!(
            plugin.get_media_uri(&silent),
            Err(PluginError::Resolution { .. })
        ));

        transport.raw("api/v1/songs/s2", 503, b"maintenance".to_vec());
        let unavailable = PlayableItem::new("melodee|s2", "melodee://song/s2", "Two", 0);
        assert!(matches!(
            plugin.get_media_uri(&unavailable),
            Err(PluginError::UpstreamHttp { status: 503, .. })
        ));

        transport.fail("api/v1/songs/s1");
        let offline = PlayableItem::new("melodee|s1", "melodee://song/s1", "One", 0);
        assert!(matches!(
            plugin.get_media_uri(&offline),
            Err(PluginError::Transport { .. })
        ));
    }

    #[test]
    fn upstream_errors_surface_with_status() {
        let transport = library();
        transport.raw("api/v1/songs?page=1&", 500, b"boom".to_vec());
        let plugin = plugin(&transport, false);
        assert_eq!(
            plugin.get_media_items(&CatalogRequest::category(CATEGORY_SONGS), None),
            Err(PluginError::UpstreamHttp {
                status: 500,
                body: "boom".into()
            })
        );
    }

    #[test]
    fn favorite_toggles_star() {
        let transport = library();
        transport.raw("api/v1/songs/starred/", 200, Vec::new());
        let plugin = plugin(&transport, false);

        assert_eq!(plugin.favorite(&MediaId::new("melodee|s1")), Ok(true));
        assert_eq!(plugin.favorite(&MediaId::new("melodee|s3")), Ok(false));

        let posts: Vec<String> = transport
            .requests()
            .into_iter()
            .filter(|r| r.method == HttpMethod::Post)
            .map(|r| r.url)
            .collect();
        assert_eq!(
            posts,
            [
                "https://melodee.example/api/v1/songs/starred/s1/true",
                "https://melodee.example/api/v1/songs/starred/s3/false",
            ]
        );
    }

    #[test]
    fn suggestions_are_distinct_titles() {
        let transport = library();
        transport.json(
            "api/v1/search/songs?q=th",
            page(
                vec![
                    song("s3", "Three", true),
                    song("s6", "Three", false),
                    song("s7", "Thriller", false),
                ],
                false,
            ),
        );
        let plugin = plugin(&transport, false);
        assert_eq!(
            plugin.get_suggestions(CATEGORY_SONGS, "th").unwrap(),
            ["Three", "Thriller"]
        );
        assert!(plugin.get_suggestions(CATEGORY_SONGS, "  ").unwrap().is_empty());
    }

    #[test]
    fn buffered_songs_resolve_to_bytes() {
        let transport = library();
        transport.raw("stream/s2", 200, b"ID3\x04fake".to_vec());
        let plugin = plugin(&transport, true);
        assert!(plugin.capabilities().data_source);

        let listed = plugin
            .get_media_items(&CatalogRequest::category(CATEGORY_SONGS), None)
            .unwrap();
        let second = listed.items[1].as_playable().unwrap();
        assert!(second.is_data_source);

        let Resolution::DataSource(source) = resolve(&plugin, second).unwrap() else {
            panic!("expected buffered data source");
        };
        assert_eq!(source.size(), Some(8));
        let mut magic = [0u8; 3];
        source.read_at(0, &mut magic).unwrap();
        assert_eq!(&magic, b"ID3");
    }

    #[test]
    fn unknown_category_is_not_found() {
        let plugin = plugin(&library(), false);
        assert!(matches!(
            plugin.get_media_items(&CatalogRequest::category("Stations"), None),
            Err(PluginError::NotFound { .. })
        ));
    }
}
