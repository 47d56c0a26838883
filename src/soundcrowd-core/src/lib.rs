pub mod config;
pub mod logging;
pub mod metadata;
pub mod metadata_db;
pub mod models;
pub mod pagination;
pub mod paths;
pub mod plugin;
pub mod plugin_contract;
pub mod redact;
pub mod resolver;
pub mod session;
pub mod transport;

pub use config::{
    Config, ConfigError, DatabaseConfig, FilesystemPluginConfig, HttpConfig, LogLevel,
    LoggingConfig, MelodeePluginConfig, PluginsConfig, ValidationError,
};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use metadata::{MetadataMap, RecordError};
pub use metadata_db::{DbError, DbResult, MetadataDatabase};
pub use models::{
    BrowsableItem, CatalogEntry, MediaId, MediaRecord, MediaType, Page, PageCursor,
    PlayableItem, Rating, TextItem,
};
pub use pagination::{CursorState, Paginator};
pub use paths::{AppDirs, DirsError};
pub use plugin::{
    CatalogRequest, Plugin, PluginCallback, PluginCapabilities, PluginError, PluginResult,
    Preference,
};
pub use plugin_contract::{
    run_plugin_contract, PluginContractError, PluginContractExpectations, SearchExpectation,
};
pub use resolver::{resolve, resolve_uri, DataSource, MemoryDataSource, Resolution};
pub use session::PluginSession;
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, TransportResult,
};

pub const APP_NAME: &str = "soundcrowd";
pub const APP_AUTHOR: &str = "SoundCrowd";
pub const APP_QUALIFIER: &str = "io";
