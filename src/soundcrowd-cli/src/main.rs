use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filesystem_plugin::FilesystemPlugin;
use melodee_plugin::MelodeePlugin;
use soundcrowd_core::resolver::resolve_uri;
use soundcrowd_core::{
    init_logging, AppDirs, CatalogEntry, CatalogRequest, Config, MediaId, MetadataDatabase,
    Plugin, PluginSession, Resolution, Transport,
};
use soundcrowd_http::HttpTransport;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "soundcrowd", version, about = "Browse and resolve media through SoundCrowd plugins")]
struct Cli {
    /// Plugin override (takes precedence over config)
    #[arg(long, global = true)]
    plugin: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List available plugins
    Plugins,
    /// List the media and search categories of the selected plugin
    Categories,
    /// Page through a category
    Browse {
        category: String,
        /// Node inside the category (folder, album, playlist id)
        #[arg(long)]
        path: Option<String>,
        /// Number of consecutive pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Start over from the first page
        #[arg(long)]
        refresh: bool,
        /// Resolve listed items for playback and remember them
        #[arg(long)]
        resolve: bool,
    },
    /// Search a category
    Search {
        category: String,
        query: String,
        #[arg(long, default_value = "")]
        path: String,
        /// Plugin-specific search type
        #[arg(long = "type")]
        search_type: Option<String>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long)]
        resolve: bool,
    },
    /// Query completions
    Suggest { category: String, query: String },
    /// Resolve a remembered media id, or a bare uri
    Resolve { target: String },
    /// Show what the metadata store remembers about an id
    Cached { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PluginKind {
    Filesystem,
    Melodee,
}

impl PluginKind {
    const ALL: [PluginKind; 2] = [PluginKind::Filesystem, PluginKind::Melodee];

    fn name(self) -> &'static str {
        match self {
            PluginKind::Filesystem => filesystem_plugin::PLUGIN_NAME,
            PluginKind::Melodee => melodee_plugin::PLUGIN_NAME,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
enum SelectionError {
    #[error("unknown plugin '{0}' (available: filesystem, melodee)")]
    Unknown(String),
    #[error("plugin '{0}' is not configured; add [plugins.{0}] to config.toml")]
    NotConfigured(&'static str),
}

fn select_plugin(config: &Config, cli_plugin: Option<&str>) -> Result<PluginKind, SelectionError> {
    let requested = cli_plugin
        .or(config.default_plugin.as_deref())
        .unwrap_or(filesystem_plugin::PLUGIN_NAME);
    let kind = PluginKind::ALL
        .into_iter()
        .find(|k| k.name().eq_ignore_ascii_case(requested))
        .ok_or_else(|| SelectionError::Unknown(requested.to_string()))?;
    if kind == PluginKind::Melodee && config.plugins.melodee.is_none() {
        return Err(SelectionError::NotConfigured(kind.name()));
    }
    Ok(kind)
}

fn build_plugin(
    kind: PluginKind,
    config: &Config,
    transport: Arc<dyn Transport>,
) -> Result<Arc<dyn Plugin>> {
    let plugin: Arc<dyn Plugin> = match kind {
        PluginKind::Filesystem => {
            let fs = &config.plugins.filesystem;
            Arc::new(FilesystemPlugin::new(fs.roots.clone(), fs.page_size)?)
        }
        PluginKind::Melodee => {
            let melodee = config
                .plugins
                .melodee
                .as_ref()
                .ok_or(SelectionError::NotConfigured(kind.name()))?;
            Arc::new(MelodeePlugin::new(melodee, transport)?)
        }
    };
    Ok(plugin)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;

    let kind = select_plugin(&config, cli.plugin.as_deref())?;
    let mut out = std::io::stdout().lock();
    if let Command::Plugins = cli.command {
        return print_plugins(&config, kind, &mut out);
    }

    let transport = Arc::new(HttpTransport::new(&config.http)?);
    let plugin = build_plugin(kind, &config, transport)?;
    let db_path = config.database.resolve_path(&dirs);
    let records = MetadataDatabase::open(&db_path)
        .with_context(|| format!("opening metadata store {}", db_path.display()))?;
    tracing::info!(plugin = kind.name(), db = %db_path.display(), "starting session");

    let mut session = PluginSession::new(plugin).with_records(records);
    run(&mut session, cli.command, &mut out)
}

fn print_plugins(config: &Config, selected: PluginKind, out: &mut impl Write) -> Result<()> {
    for kind in PluginKind::ALL {
        let marker = if kind == selected { " (selected)" } else { "" };
        let configured = match kind {
            PluginKind::Filesystem => !config.plugins.filesystem.roots.is_empty(),
            PluginKind::Melodee => config.plugins.melodee.is_some(),
        };
        let state = if configured { "configured" } else { "not configured" };
        writeln!(out, "{}{marker}: {state}", kind.name())?;
    }
    Ok(())
}

fn run(session: &mut PluginSession, command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Plugins => {}
        Command::Categories => {
            let plugin = session.plugin();
            writeln!(out, "media: {}", plugin.media_categories().join(", "))?;
            writeln!(out, "search: {}", plugin.search_categories().join(", "))?;
        }
        Command::Browse {
            category,
            path,
            pages,
            refresh,
            resolve,
        } => {
            let request = match path {
                Some(path) => CatalogRequest::at_path(category, path),
                None => CatalogRequest::category(category),
            };
            list_pages(session, &request, pages, refresh, resolve, out)?;
        }
        Command::Search {
            category,
            query,
            path,
            search_type,
            pages,
            resolve,
        } => {
            let request = CatalogRequest::search(category, path, query, search_type);
            list_pages(session, &request, pages, false, resolve, out)?;
        }
        Command::Suggest { category, query } => {
            for suggestion in session.suggestions(&category, &query)? {
                writeln!(out, "{suggestion}")?;
            }
        }
        Command::Resolve { target } => {
            let resolution = if target.contains("://") {
                resolve_uri(session.plugin(), &target)?
            } else {
                session.resolve_cached(&MediaId::new(target))?
            };
            writeln!(out, "{}", describe_resolution(&resolution))?;
        }
        Command::Cached { id } => match session.lookup(&MediaId::new(id.as_str()))? {
            Some(item) => writeln!(out, "{}", describe_entry(&item.into()))?,
            None => writeln!(out, "{id}: not cached")?,
        },
    }
    Ok(())
}

fn list_pages(
    session: &mut PluginSession,
    request: &CatalogRequest,
    pages: u32,
    refresh: bool,
    resolve: bool,
    out: &mut impl Write,
) -> Result<()> {
    for page in 0..pages.max(1) {
        let entries = session.request(request, refresh && page == 0)?;
        if entries.is_empty() {
            writeln!(out, "-- end of listing --")?;
            break;
        }
        for entry in &entries {
            writeln!(out, "{}", describe_entry(entry))?;
            if let (true, Some(item)) = (resolve, entry.as_playable()) {
                match session.resolve(item) {
                    Ok(resolution) => writeln!(out, "  -> {}", describe_resolution(&resolution))?,
                    Err(err) => writeln!(out, "  -> unresolved: {err}")?,
                }
            }
        }
    }
    Ok(())
}

fn describe_entry(entry: &CatalogEntry) -> String {
    match entry {
        CatalogEntry::Playable(item) => {
            let secs = item.duration_ms / 1000;
            let artist = item.artist.as_deref().unwrap_or("?");
            format!(
                "{}\t{artist} - {} [{}:{:02}]\t{}",
                item.id,
                item.title,
                secs / 60,
                secs % 60,
                item.uri
            )
        }
        CatalogEntry::Browsable(node) => format!("{}\t[{}] {}", node.id, node.media_type, node.title),
        CatalogEntry::Text(text) => text.text.clone(),
    }
}

fn describe_resolution(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Unchanged(uri) => format!("{uri} (direct)"),
        Resolution::Uri(uri) => uri.clone(),
        Resolution::DataSource(source) => match source.size() {
            Some(size) => format!("<data source, {size} bytes>"),
            None => "<data source>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use soundcrowd_core::config::MelodeePluginConfig;
    use soundcrowd_core::PlayableItem;
    use std::fs;
    use tempfile::tempdir;

    fn melodee_config() -> MelodeePluginConfig {
        MelodeePluginConfig {
            base_url: "https://melodee.example".into(),
            access_token: None,
            page_size: 50,
            buffer_streams: false,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_browse_with_global_plugin() {
        let cli = Cli::try_parse_from([
            "soundcrowd", "browse", "Albums", "--path", "al1", "--pages", "3", "--plugin",
            "melodee",
        ])
        .unwrap();
        assert_eq!(cli.plugin.as_deref(), Some("melodee"));
        match cli.command {
            Command::Browse {
                category,
                path,
                pages,
                refresh,
                resolve,
            } => {
                assert_eq!(category, "Albums");
                assert_eq!(path.as_deref(), Some("al1"));
                assert_eq!(pages, 3);
                assert!(!refresh);
                assert!(!resolve);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_search_type() {
        let cli =
            Cli::try_parse_from(["soundcrowd", "search", "Tracks", "band", "--type", "artist"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Search { ref search_type, ref path, .. }
                if search_type.as_deref() == Some("artist") && path.is_empty()
        ));
    }

    #[test]
    fn plugin_selection_precedence() {
        let mut config = Config::default();
        assert_eq!(select_plugin(&config, None), Ok(PluginKind::Filesystem));

        config.plugins.melodee = Some(melodee_config());
        config.default_plugin = Some("melodee".into());
        assert_eq!(select_plugin(&config, None), Ok(PluginKind::Melodee));
        assert_eq!(
            select_plugin(&config, Some("Filesystem")),
            Ok(PluginKind::Filesystem)
        );
        assert_eq!(
            select_plugin(&config, Some("soundcloud")),
            Err(SelectionError::Unknown("soundcloud".into()))
        );
    }

    #[test]
    fn unconfigured_melodee_is_rejected() {
        let config = Config::default();
        assert_eq!(
            select_plugin(&config, Some("melodee")),
            Err(SelectionError::NotConfigured("melodee"))
        );
    }

    fn filesystem_session(root: &std::path::Path) -> (PluginSession, MetadataDatabase) {
        let mut config = Config::default();
        config.plugins.filesystem.roots = vec![root.to_path_buf()];
        config.plugins.filesystem.page_size = 2;
        let transport = Arc::new(HttpTransport::new(&config.http).unwrap());
        let plugin = build_plugin(PluginKind::Filesystem, &config, transport).unwrap();
        let records = MetadataDatabase::open_in_memory().unwrap();
        (PluginSession::new(plugin).with_records(records.clone()), records)
    }

    fn output(session: &mut PluginSession, command: Command) -> String {
        let mut out = Vec::new();
        run(session, command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn browse_resolve_then_cached() {
        let dir = tempdir().unwrap();
        for name in ["a", "b", "c"] {
            fs::write(dir.path().join(format!("{name}.mp3")), b"not audio").unwrap();
        }
        let (mut session, records) = filesystem_session(dir.path());

        let listed = output(
            &mut session,
            Command::Browse {
                category: "Tracks".into(),
                path: None,
                pages: 5,
                refresh: false,
                resolve: true,
            },
        );
        assert_eq!(listed.matches("(direct)").count(), 3);
        assert!(listed.ends_with("-- end of listing --\n"));
        assert_eq!(records.len().unwrap(), 3);

        let id = listed.lines().next().unwrap().split('\t').next().unwrap().to_string();
        let cached = output(&mut session, Command::Cached { id: id.clone() });
        assert!(cached.contains("a.mp3"));

        let resolved = output(&mut session, Command::Resolve { target: id });
        assert!(resolved.trim_end().ends_with("(direct)"));

        let missing = output(&mut session, Command::Cached { id: "filesystem|/nope".into() });
        assert_eq!(missing, "filesystem|/nope: not cached\n");
    }

    #[test]
    fn entries_render_compactly() {
        let item = PlayableItem::new("x|1", "https://x/1", "Song", 125_000).with_artist("Band");
        assert_eq!(
            describe_entry(&item.into()),
            "x|1\tBand - Song [2:05]\thttps://x/1"
        );
    }
}
