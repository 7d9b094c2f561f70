// # tunesync - command-line entry point
//
// Thin integration layer: reads configuration from the environment, builds
// the record store and streaming library through the client registry, runs
// one operation and prints its JSON response on stdout. All sync and mirror
// logic lives in tunesync-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Record Store
// - `TUNESYNC_STORE_TYPE`: Store type (airtable, file, memory)
// - `TUNESYNC_AIRTABLE_API_KEY`: Airtable API key
// - `TUNESYNC_AIRTABLE_BASE_ID`: Airtable base id
// - `TUNESYNC_AIRTABLE_API_URL`: API endpoint override (optional)
// - `TUNESYNC_STORE_PATH`: Snapshot path (for file)
// - `TUNESYNC_MODE`: `dry-run` logs Airtable writes instead of sending them
//
// ### Streaming Library
// - `TUNESYNC_SPOTIFY_ACCESS_TOKEN`: OAuth access token of the signed-in account
// - `TUNESYNC_SPOTIFY_API_URL`: API endpoint override (optional)
//
// ### Sync
// - `TUNESYNC_PAGE_SIZE`: Saved tracks per page (1-50)
// - `TUNESYNC_MAX_PAGES`: Saved-track pages walked per sync
// - `TUNESYNC_PLAYLIST_PUBLIC`: Create synced playlists public (true/false)
//
// ### Mirror
// - `TUNESYNC_MIRROR_DEV_BASE_ID`: Airtable base copied from
// - `TUNESYNC_MIRROR_PROD_BASE_ID`: Airtable base copied to
//
// ## Example
//
// ```bash
// export TUNESYNC_AIRTABLE_API_KEY=key...
// export TUNESYNC_AIRTABLE_BASE_ID=app...
// export TUNESYNC_SPOTIFY_ACCESS_TOKEN=BQ...
//
// tunesync sync-library --username alice --start 2020.01.01 --end 2020.02.01
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;
use tunesync_core::config::{LibraryConfig, MirrorConfig, StoreConfig, SyncConfig};
use tunesync_core::{
    ClientRegistry, DevProdMirror, LibrarySync, Response, Session, StreamingLibrary,
};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TunesyncExitCode {
    /// The operation succeeded
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// The operation ran and failed
    OperationFailed = 2,
}

impl From<TunesyncExitCode> for ExitCode {
    fn from(code: TunesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser)]
#[command(name = "tunesync")]
#[command(version, about = "Sync a streaming library into an Airtable base")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the user record for the signed-in account if it is missing
    EnsureUser {
        #[arg(long)]
        username: String,
    },

    /// Import saved tracks from [start, end) into a new playlist
    SyncLibrary {
        #[arg(long)]
        username: String,
        /// First day of the window (YYYY.MM.DD)
        #[arg(long)]
        start: String,
        /// Day after the window (YYYY.MM.DD)
        #[arg(long)]
        end: String,
    },

    /// Record an existing streaming playlist and link it to the user
    ImportPlaylist {
        #[arg(long)]
        username: String,
        #[arg(long)]
        playlist_id: String,
    },

    /// Copy Product and Store records from the dev base to the prod base
    Mirror,
}

impl Command {
    fn needs_library(&self) -> bool {
        !matches!(self, Command::Mirror)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    store: StoreConfig,
    library: Option<LibraryConfig>,
    sync: SyncConfig,
    mirror: Option<MirrorConfig>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let api_key = var("TUNESYNC_AIRTABLE_API_KEY").unwrap_or_default();
        let api_url = var("TUNESYNC_AIRTABLE_API_URL");
        let airtable = |base_id: String| StoreConfig::Airtable {
            api_key: api_key.clone(),
            base_id,
            api_url: api_url.clone(),
        };

        let store_type = var("TUNESYNC_STORE_TYPE").unwrap_or_else(|| "airtable".to_string());
        let store = match store_type.as_str() {
            "airtable" => airtable(var("TUNESYNC_AIRTABLE_BASE_ID").unwrap_or_default()),
            "memory" => StoreConfig::Memory,
            "file" => StoreConfig::File {
                path: var("TUNESYNC_STORE_PATH").context(
                    "TUNESYNC_STORE_PATH is required when TUNESYNC_STORE_TYPE=file",
                )?,
            },
            other => anyhow::bail!(
                "TUNESYNC_STORE_TYPE '{}' is not supported. \
                Supported types: airtable, file, memory",
                other
            ),
        };

        let library = var("TUNESYNC_SPOTIFY_ACCESS_TOKEN").map(|access_token| LibraryConfig::Spotify {
            access_token,
            api_url: var("TUNESYNC_SPOTIFY_API_URL"),
        });

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            page_size: parse_var(&var, "TUNESYNC_PAGE_SIZE", defaults.page_size)?,
            max_pages: parse_var(&var, "TUNESYNC_MAX_PAGES", defaults.max_pages)?,
            playlist_public: parse_var(&var, "TUNESYNC_PLAYLIST_PUBLIC", defaults.playlist_public)?,
            ..defaults
        };

        let mirror = match (
            var("TUNESYNC_MIRROR_DEV_BASE_ID"),
            var("TUNESYNC_MIRROR_PROD_BASE_ID"),
        ) {
            (Some(dev), Some(prod)) => Some(MirrorConfig::new(airtable(dev), airtable(prod))),
            (None, None) => None,
            _ => anyhow::bail!(
                "TUNESYNC_MIRROR_DEV_BASE_ID and TUNESYNC_MIRROR_PROD_BASE_ID must be set together"
            ),
        };

        Ok(Self {
            store,
            library,
            sync,
            mirror,
            log_level: var("TUNESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the parts of the configuration `command` uses
    fn validate(&self, command: &Command) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "TUNESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        if !command.needs_library() {
            let mirror = self.mirror.as_ref().context(
                "TUNESYNC_MIRROR_DEV_BASE_ID and TUNESYNC_MIRROR_PROD_BASE_ID are required for mirror",
            )?;
            mirror.validate()?;
            return Ok(());
        }

        self.store.validate()?;
        self.sync.validate()?;
        self.library
            .as_ref()
            .context(
                "TUNESYNC_SPOTIFY_ACCESS_TOKEN is required. \
                Set it via: export TUNESYNC_SPOTIFY_ACCESS_TOKEN=your_token",
            )?
            .validate()?;
        Ok(())
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_var<T>(var: impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return TunesyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate(&cli.command) {
        eprintln!("Configuration validation error: {:#}", e);
        return TunesyncExitCode::ConfigError.into();
    }

    // stdout carries only the JSON response
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TunesyncExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TunesyncExitCode::ConfigError.into();
        }
    };

    let code = rt.block_on(async {
        match run(cli.command, config).await {
            Ok(true) => TunesyncExitCode::Success,
            Ok(false) => TunesyncExitCode::OperationFailed,
            Err(e) => {
                error!("Startup error: {:#}", e);
                TunesyncExitCode::ConfigError
            }
        }
    });

    code.into()
}

fn registry() -> ClientRegistry {
    let registry = ClientRegistry::with_builtin_stores();

    #[cfg(feature = "airtable")]
    tunesync_store_airtable::register(&registry);

    #[cfg(feature = "spotify")]
    tunesync_library_spotify::register(&registry);

    debug!(
        stores = ?registry.list_stores(),
        libraries = ?registry.list_libraries(),
        "client registry ready"
    );
    registry
}

/// Run one command, returning whether its response was successful
async fn run(command: Command, config: Config) -> Result<bool> {
    let registry = registry();
    if !command.needs_library() {
        return run_mirror(&registry, config.mirror.as_ref()).await;
    }

    let library_config = config
        .library
        .as_ref()
        .context("streaming library configuration missing")?;
    let store = registry.create_store(&config.store).await?;
    let library: Arc<dyn StreamingLibrary> = Arc::from(registry.create_library(library_config)?);

    // the signed-in account is the one the access token belongs to
    let session = match library.current_user().await {
        Ok(me) => Session::authenticated(me.external_id),
        Err(e) => {
            error!("Could not resolve the signed-in account: {}", e);
            return emit(&Response::<()>::failed(e));
        }
    };

    let (sync, mut events) = LibrarySync::new(Arc::from(store), library, config.sync)?;
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(operation = ?event.operation, state = %event.state, "sync event");
        }
    });

    let ok = match command {
        Command::EnsureUser { username } => emit(&sync.ensure_user_exists(&session, &username).await),
        Command::SyncLibrary {
            username,
            start,
            end,
        } => emit(
            &sync
                .sync_library_to_playlist(&session, &username, &start, &end)
                .await,
        ),
        Command::ImportPlaylist {
            username,
            playlist_id,
        } => emit(
            &sync
                .import_existing_playlist(&session, &username, &playlist_id)
                .await,
        ),
        Command::Mirror => run_mirror(&registry, config.mirror.as_ref()).await,
    };

    // closing the sender ends the drain loop
    drop(sync);
    let _ = drain.await;
    ok
}

async fn run_mirror(registry: &ClientRegistry, config: Option<&MirrorConfig>) -> Result<bool> {
    let config = config.context("mirror configuration missing")?;
    let dev = registry.create_store(&config.dev).await?;
    let prod = registry.create_store(&config.prod).await?;
    let mirror = DevProdMirror::new(Arc::from(dev), Arc::from(prod), config)?;

    info!("Mirroring dev base to prod base");
    emit(&mirror.mirror_dev_to_prod().await)
}

fn emit<T: Serialize>(response: &Response<T>) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(response.is_success())
}
