use lofty::{Accessor, AudioFile, ItemKey, Probe, TaggedFileExt};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ParsedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Reads embedded tags; unreadable files yield empty tags.
pub fn parse_tags(path: &Path) -> ParsedTags {
    let tagged = match Probe::open(path).and_then(|p| p.read()) {
        Ok(tagged) => tagged,
        Err(err) => {
            tracing::trace!(path = %path.display(), "no readable tags: {err}");
            return ParsedTags::default();
        }
    };

    let tag = tagged.primary_tag().or_else(|| tagged.first_tag());
    let non_empty = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());

    let title = tag.and_then(|t| t.get_string(&ItemKey::TrackTitle).and_then(non_empty));
    let artist = tag.and_then(|t| t.artist().as_deref().and_then(non_empty));
    let album = tag.and_then(|t| t.album().as_deref().and_then(non_empty));
    let duration = tagged.properties().duration().as_millis();

    ParsedTags {
        title,
        artist,
        album,
        duration_ms: u64::try_from(duration).ok().filter(|d| *d > 0),
    }
}
