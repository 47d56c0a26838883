//! Turns catalog items into something the player can open.

use crate::models::{MediaId, PlayableItem};
use crate::plugin::{Plugin, PluginResult};
use std::fmt;
use std::io;

/// Random-access byte source, for media that cannot be streamed by uri.
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Total size in bytes, when known.
    fn size(&self) -> Option<u64>;

    /// Reads up to `buf.len()` bytes starting at `position`. Returns 0 at
    /// end of data.
    fn read_at(&self, position: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// Fully buffered data source.
#[derive(Clone, PartialEq, Eq)]
pub struct MemoryDataSource {
    bytes: Vec<u8>,
}

impl MemoryDataSource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for MemoryDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDataSource")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl DataSource for MemoryDataSource {
    fn size(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    fn read_at(&self, position: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(position) else {
            return Ok(0);
        };
        if start >= self.bytes.len() {
            return Ok(0);
        }
        let available = &self.bytes[start..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        Ok(count)
    }
}

/// Outcome of resolving a playable item.
#[derive(Debug)]
pub enum Resolution {
    /// The declared uri is directly playable.
    Unchanged(String),
    /// The plugin exchanged the declared uri for a stream uri.
    Uri(String),
    DataSource(Box<dyn DataSource>),
}

impl Resolution {
    pub fn uri(&self) -> Option<&str> {
        match self {
            Resolution::Unchanged(uri) | Resolution::Uri(uri) => Some(uri),
            Resolution::DataSource(_) => None,
        }
    }

    pub fn is_data_source(&self) -> bool {
        matches!(self, Resolution::DataSource(_))
    }
}

/// Resolves `item` through `plugin`.
///
/// Items flagged as data sources ask the plugin for a byte source first and
/// fall back to uri resolution when the plugin has none. Errors abort only
/// this item.
pub fn resolve<P: Plugin + ?Sized>(plugin: &P, item: &PlayableItem) -> PluginResult<Resolution> {
    if item.is_data_source {
        if let Some(source) = plugin.get_data_source(item)? {
            tracing::debug!(id = %item.id, size = ?source.size(), "resolved data source");
            return Ok(Resolution::DataSource(source));
        }
        tracing::debug!(id = %item.id, "plugin has no data source, resolving uri");
    }

    match plugin.get_media_uri(item)? {
        Some(uri) if uri != item.uri => {
            tracing::debug!(id = %item.id, "resolved stream uri");
            Ok(Resolution::Uri(uri))
        }
        _ => Ok(Resolution::Unchanged(item.uri.clone())),
    }
}

/// Resolves a bare uri, for hosts that only kept the locator.
pub fn resolve_uri<P: Plugin + ?Sized>(plugin: &P, uri: &str) -> PluginResult<Resolution> {
    let item = PlayableItem::new(MediaId::new(uri), uri, uri, 0).with_plugin(plugin.name());
    resolve(plugin, &item)
}
