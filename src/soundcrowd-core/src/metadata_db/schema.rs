//! Schema of the media record store.

pub struct VersionedSchema {
    pub version: u32,
    pub up: &'static str,
}

/// Version 1 databases have the same table; upgrading only moves the stamp.
pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 2,
    up: r#"
            CREATE TABLE IF NOT EXISTS MediaItems (
                id TEXT PRIMARY KEY,
                artist TEXT NOT NULL,
                title TEXT NOT NULL,
                duration INTEGER NOT NULL,
                source TEXT NOT NULL UNIQUE,
                download TEXT UNIQUE,
                album_art_url TEXT NOT NULL,
                waveform_url TEXT
            );
        "#,
}];

pub fn current() -> &'static VersionedSchema {
    &VERSIONED_SCHEMAS[VERSIONED_SCHEMAS.len() - 1]
}
