use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;

use crate::bootstrap::{self, ServerSet};
use crate::config::Config;
use crate::driver::{ApiDriver, BackendConfig, DonutConfig, MemoryConfig, WebDriver};
use crate::error::ConfigError;
use crate::observability;
use crate::process::{ProcessInfo, VERSION};
use crate::transport::TransportConfig;
use crate::units::{parse_duration, parse_size};

/// Minio object storage server.
///
/// Listener flags may be given before the command or after the mode. Flags after the mode win.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// address of the object API, defaults to :9000
    #[argh(option)]
    api_address: Option<String>,

    /// address of the management API, defaults to :9001
    #[argh(option)]
    web_address: Option<String>,

    /// certificate file to serve the object API over https
    #[argh(option)]
    cert: Option<PathBuf>,

    /// private key file to serve the object API over https
    #[argh(option)]
    key: Option<PathBuf>,

    /// enable debug mode
    #[argh(switch)]
    debug: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Mode(ModeCommand),
    Version(VersionCommand),
}

/// select a storage mode and start the server
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "mode")]
struct ModeCommand {
    #[argh(subcommand)]
    mode: Mode,
}

/// print the server version
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Mode {
    Memory(MemoryCommand),
    Donut(DonutCommand),
}

/// keep objects in a size-bounded, volatile memory store
///
/// Usage: limit SIZE [expire TIME], for example `limit 64MB expire 1h`.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "memory")]
struct MemoryCommand {
    /// memory limit and optional expiration: limit SIZE [expire TIME]
    #[argh(positional)]
    args: Vec<String>,

    /// address of the object API, defaults to :9000
    #[argh(option)]
    api_address: Option<String>,

    /// address of the management API, defaults to :9001
    #[argh(option)]
    web_address: Option<String>,

    /// certificate file to serve the object API over https
    #[argh(option)]
    cert: Option<PathBuf>,

    /// private key file to serve the object API over https
    #[argh(option)]
    key: Option<PathBuf>,

    /// enable debug mode
    #[argh(switch)]
    debug: bool,
}

/// mirror objects across one or more directories
///
/// Without a path, objects are stored in ~/minio-storage/donut.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "donut")]
struct DonutCommand {
    /// directories to store objects in
    #[argh(positional)]
    args: Vec<String>,

    /// address of the object API, defaults to :9000
    #[argh(option)]
    api_address: Option<String>,

    /// address of the management API, defaults to :9001
    #[argh(option)]
    web_address: Option<String>,

    /// certificate file to serve the object API over https
    #[argh(option)]
    cert: Option<PathBuf>,

    /// private key file to serve the object API over https
    #[argh(option)]
    key: Option<PathBuf>,

    /// enable debug mode
    #[argh(switch)]
    debug: bool,
}

/// Listener flags accepted globally and by every mode. They take precedence over the
/// configuration file.
#[derive(Debug)]
struct ListenerFlags<'a> {
    api_address: Option<&'a str>,
    web_address: Option<&'a str>,
    cert: Option<&'a Path>,
    key: Option<&'a Path>,
    debug: bool,
}

impl<'a> ListenerFlags<'a> {
    /// Fills flags missing in `self` from `fallback`.
    fn or(self, fallback: ListenerFlags<'a>) -> Self {
        Self {
            api_address: self.api_address.or(fallback.api_address),
            web_address: self.web_address.or(fallback.web_address),
            cert: self.cert.or(fallback.cert),
            key: self.key.or(fallback.key),
            debug: self.debug || fallback.debug,
        }
    }
}

macro_rules! impl_listener_flags {
    ($($command:ty),*) => {
        $(
            impl $command {
                fn listener_flags(&self) -> ListenerFlags<'_> {
                    ListenerFlags {
                        api_address: self.api_address.as_deref(),
                        web_address: self.web_address.as_deref(),
                        cert: self.cert.as_deref(),
                        key: self.key.as_deref(),
                        debug: self.debug,
                    }
                }
            }
        )*
    };
}

impl_listener_flags!(Args, MemoryCommand, DonutCommand);

impl Mode {
    /// Renders the help text of this mode.
    fn usage(&self) -> String {
        match self {
            Mode::Memory(_) => usage::<MemoryCommand>(&["minio mode memory"]),
            Mode::Donut(_) => usage::<DonutCommand>(&["minio mode donut"]),
        }
    }
}

fn usage<T: FromArgs>(command: &[&str]) -> String {
    match T::from_args(command, &["--help"]) {
        Err(early_exit) => early_exit.output,
        Ok(_) => String::new(),
    }
}

/// Scanner states of the `mode memory` arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    /// Expecting a keyword.
    Start,
    /// Expecting the value of `limit`.
    SawLimit,
    /// Expecting the value of `expire`.
    SawExpire,
}

/// Parses `limit SIZE [expire TIME]` in any order.
fn parse_memory_args(args: &[String]) -> Result<MemoryConfig, ConfigError> {
    let mut limit: Option<(&str, u64)> = None;
    let mut expire: Option<Duration> = None;
    let mut state = ScanState::Start;

    for token in args {
        state = match state {
            ScanState::Start => match token.as_str() {
                "limit" if limit.is_some() => return Err(ConfigError::Duplicate("limit")),
                "limit" => ScanState::SawLimit,
                "expire" if expire.is_some() => return Err(ConfigError::Duplicate("expire")),
                "expire" => ScanState::SawExpire,
                other => return Err(ConfigError::UnexpectedArgument(other.to_owned())),
            },
            ScanState::SawLimit => {
                let capacity = parse_size(token).map_err(|source| ConfigError::InvalidSize {
                    value: token.clone(),
                    source,
                })?;
                limit = Some((token.as_str(), capacity));
                ScanState::Start
            }
            ScanState::SawExpire => {
                let ttl = parse_duration(token).map_err(|source| ConfigError::InvalidDuration {
                    value: token.clone(),
                    source,
                })?;
                expire = Some(ttl);
                ScanState::Start
            }
        };
    }

    match state {
        ScanState::Start => (),
        ScanState::SawLimit => return Err(ConfigError::MissingValue("limit")),
        ScanState::SawExpire => return Err(ConfigError::MissingValue("expire")),
    }

    let (literal, capacity) = limit.ok_or(ConfigError::MissingLimit)?;
    MemoryConfig::new(literal, capacity, expire)
}

/// Everything needed to start the listeners of one process.
#[derive(Debug)]
struct Plan {
    backend: BackendConfig,
    api: TransportConfig,
    web_address: String,
    debug: bool,
}

impl Plan {
    /// Validates the selected mode against the loaded configuration.
    ///
    /// `global` holds the listener flags given before the command.
    fn new(
        mode: &Mode,
        global: ListenerFlags<'_>,
        config: &Config,
        home: &Path,
    ) -> Result<Self, ConfigError> {
        let (backend, flags) = match mode {
            Mode::Memory(command) => (
                BackendConfig::Memory(parse_memory_args(&command.args)?),
                command.listener_flags(),
            ),
            Mode::Donut(command) => (
                BackendConfig::Donut(DonutConfig::new(&command.args, home)),
                command.listener_flags(),
            ),
        };
        let flags = flags.or(global);

        let api = TransportConfig::new(
            flags.api_address.unwrap_or(&config.api.addr),
            flags.cert.or(config.api.cert.as_deref()),
            flags.key.or(config.api.key.as_deref()),
        )?;

        Ok(Self {
            backend,
            api,
            web_address: flags.web_address.unwrap_or(&config.web.addr).to_owned(),
            debug: flags.debug || config.debug,
        })
    }

    /// Builds the drivers of both listeners. Nothing is opened or bound yet.
    fn into_server_set(self, info: Arc<ProcessInfo>) -> ServerSet {
        ServerSet::new()
            .with_driver(ApiDriver::new(self.backend, self.api))
            .with_driver(WebDriver::new(self.web_address, info))
    }
}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let home = dirs::home_dir().context("failed to determine the home directory")?;
    let args: Args = argh::from_env();

    let mode = match &args.command {
        Command::Version(VersionCommand {}) => {
            println!("{VERSION}");
            return Ok(());
        }
        Command::Mode(ModeCommand { mode }) => mode,
    };

    let config = Config::load(args.config.as_deref())?;
    let plan = Plan::new(mode, args.listener_flags(), &config, &home).inspect_err(|error| {
        if error.shows_usage() {
            eprintln!("{}", mode.usage());
        }
    })?;

    // Ensure a rustls crypto provider is installed, required on distroless.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads.max(1))
        .build()
        .context("failed to build the async runtime")?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    let info = Arc::new(ProcessInfo::new(plan.debug));
    if let Some(system) = &info.system {
        tracing::info!(
            platform = %system.platform,
            runtime = %system.runtime,
            memory = %system.memory,
            "system information"
        );
    }
    tracing::info!(version = VERSION, backend = ?plan.backend, "starting minio");

    let metrics_guard = observability::init_metrics(&config)?;

    runtime.block_on(async move {
        let result = bootstrap::run(plan.into_server_set(info)).await;

        if let Some(metrics_guard) = metrics_guard {
            metrics_guard.flush(None).await?;
        }

        result
    })
}
