//! Flat key/value metadata shape exchanged between plugins, the record store
//! and the host.
//!
//! The map is loosely typed on purpose (it mirrors what hosts put into their
//! media sessions); [`MediaRecord`] is the typed view and conversions between
//! the two validate at the boundary.

use crate::models::{MediaRecord, MediaType, PlayableItem};
use serde_json::{Map, Value};
use thiserror::Error;

pub const KEY_MEDIA_ID: &str = "MEDIA_ID";
pub const KEY_MEDIA_URI: &str = "MEDIA_URI";
pub const KEY_ARTIST: &str = "ARTIST";
pub const KEY_TITLE: &str = "TITLE";
pub const KEY_ALBUM: &str = "ALBUM";
pub const KEY_DURATION: &str = "DURATION";
pub const KEY_ALBUM_ART_URI: &str = "ALBUM_ART_URI";
pub const KEY_WAVEFORM_URL: &str = "WAVEFORM_URL";
pub const KEY_DOWNLOAD_URL: &str = "DOWNLOAD_URL";
pub const KEY_URL: &str = "URL";
pub const KEY_PLUGIN: &str = "PLUGIN";
pub const KEY_DATASOURCE: &str = "DATASOURCE";
pub const KEY_SOURCE: &str = "SOURCE";
pub const KEY_TYPE: &str = "TYPE";

/// Provenance tag attached to records served from the local store.
pub const SOURCE_CACHE: &str = "Cache";

pub type MetadataMap = Map<String, Value>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("metadata is missing required key {key}")]
    MissingField { key: &'static str },
    #[error("metadata key {key} has an invalid value: {reason}")]
    InvalidField { key: &'static str, reason: String },
}

impl MediaRecord {
    /// Interchange shape of a cached record, tagged as a cache hit.
    pub fn to_metadata(&self) -> MetadataMap {
        let mut map = MetadataMap::new();
        map.insert(KEY_MEDIA_ID.into(), Value::from(self.id.clone()));
        map.insert(KEY_MEDIA_URI.into(), Value::from(self.source_uri.clone()));
        map.insert(KEY_ARTIST.into(), Value::from(self.artist.clone()));
        map.insert(KEY_TITLE.into(), Value::from(self.title.clone()));
        map.insert(KEY_DURATION.into(), Value::from(self.duration_ms));
        map.insert(KEY_ALBUM_ART_URI.into(), Value::from(self.artwork_uri.clone()));
        if let Some(waveform) = self.waveform_uri() {
            map.insert(KEY_WAVEFORM_URL.into(), Value::from(waveform));
        }
        if let Some(download) = self.download_uri() {
            map.insert(KEY_DOWNLOAD_URL.into(), Value::from(download));
        }
        map.insert(KEY_SOURCE.into(), Value::from(SOURCE_CACHE));
        map.insert(KEY_TYPE.into(), Value::from(MediaType::Media.as_str()));
        map
    }

    /// Validates a metadata map into a record.
    ///
    /// The stored id is the part after the `plugin|` namespace. Empty
    /// download or waveform values count as absent.
    pub fn from_metadata(map: &MetadataMap) -> Result<Self, RecordError> {
        let media_id = required_str(map, KEY_MEDIA_ID)?;
        let id = match media_id.find(crate::models::MEDIA_ID_SEPARATOR) {
            Some(pos) => &media_id[pos + 1..],
            None => media_id,
        };
        if id.is_empty() {
            return Err(RecordError::InvalidField {
                key: KEY_MEDIA_ID,
                reason: "empty id".into(),
            });
        }

        let duration_ms = match map.get(KEY_DURATION) {
            None | Some(Value::Null) => {
                return Err(RecordError::MissingField { key: KEY_DURATION })
            }
            Some(value) => value.as_u64().ok_or_else(|| RecordError::InvalidField {
                key: KEY_DURATION,
                reason: format!("expected a non-negative integer, got {value}"),
            })?,
        };

        let mut record = Self::new(
            id,
            required_str(map, KEY_ARTIST)?,
            required_str(map, KEY_TITLE)?,
            duration_ms,
            required_str(map, KEY_MEDIA_URI)?,
            required_str(map, KEY_ALBUM_ART_URI)?,
        );
        if let Some(download) = optional_str(map, KEY_DOWNLOAD_URL)? {
            record = record.with_download(download);
        }
        if let Some(waveform) = optional_str(map, KEY_WAVEFORM_URL)? {
            record = record.with_waveform(waveform);
        }
        Ok(record)
    }
}

impl PlayableItem {
    /// Interchange shape of a live plugin item.
    pub fn to_metadata(&self) -> MetadataMap {
        let mut map = MetadataMap::new();
        map.insert(KEY_MEDIA_ID.into(), Value::from(self.id.0.clone()));
        map.insert(KEY_MEDIA_URI.into(), Value::from(self.uri.clone()));
        map.insert(KEY_TITLE.into(), Value::from(self.title.clone()));
        map.insert(KEY_DURATION.into(), Value::from(self.duration_ms));
        map.insert(
            KEY_ARTIST.into(),
            Value::from(self.artist.clone().unwrap_or_default()),
        );
        map.insert(
            KEY_ALBUM_ART_URI.into(),
            Value::from(self.artwork_uri.clone().unwrap_or_default()),
        );
        let optional = [
            (KEY_ALBUM, &self.album),
            (KEY_WAVEFORM_URL, &self.waveform_url),
            (KEY_URL, &self.url),
            (KEY_PLUGIN, &self.plugin),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.into(), Value::from(value.clone()));
            }
        }
        if self.is_data_source {
            map.insert(KEY_DATASOURCE.into(), Value::Bool(true));
        }
        map.insert(KEY_TYPE.into(), Value::from(MediaType::Media.as_str()));
        map
    }
}

fn required_str<'a>(map: &'a MetadataMap, key: &'static str) -> Result<&'a str, RecordError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(RecordError::MissingField { key }),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(RecordError::InvalidField {
            key,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn optional_str(map: &MetadataMap, key: &'static str) -> Result<Option<String>, RecordError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RecordError::InvalidField {
            key,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_map() -> MetadataMap {
        json!({
            "MEDIA_ID": "melodee|song-7",
            "MEDIA_URI": "https://music.example/stream/7",
            "ARTIST": "Artist",
            "TITLE": "Seven",
            "DURATION": 215000,
            "ALBUM_ART_URI": "",
            "WAVEFORM_URL": ""
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn map_becomes_record_with_local_id() {
        let record = MediaRecord::from_metadata(&sample_map()).unwrap();
        assert_eq!(record.id, "song-7");
        assert_eq!(record.duration_ms, 215_000);
        assert_eq!(record.artwork_uri, "");
        assert_eq!(record.waveform_uri(), None);
        assert_eq!(record.download_uri(), None);
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let mut map = sample_map();
        map.remove(KEY_TITLE);
        assert_eq!(
            MediaRecord::from_metadata(&map),
            Err(RecordError::MissingField { key: KEY_TITLE })
        );
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut map = sample_map();
        map.insert(KEY_DURATION.into(), json!(-1));
        assert!(matches!(
            MediaRecord::from_metadata(&map),
            Err(RecordError::InvalidField {
                key: KEY_DURATION,
                ..
            })
        ));
    }

    #[test]
    fn record_metadata_is_tagged_as_cache() {
        let record = MediaRecord::from_metadata(&sample_map()).unwrap();
        let map = record.to_metadata();
        assert_eq!(map[KEY_SOURCE], json!(SOURCE_CACHE));
        assert_eq!(map[KEY_TYPE], json!("MEDIA"));
        assert_eq!(MediaRecord::from_metadata(&map).unwrap(), record);
    }

    #[test]
    fn playable_metadata_flags_data_sources() {
        let item = PlayableItem::new("p|1", "https://x/1", "One", 1).as_data_source();
        let map = item.to_metadata();
        assert_eq!(map[KEY_DATASOURCE], json!(true));
        assert_eq!(MediaRecord::from_metadata(&map).unwrap().id, "1");
    }
}
