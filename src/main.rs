use chrono::Utc;
use clap::{Parser, Subcommand};
use geoclock::clock::{CdnFlagSource, ClockPresenter, FlagImageCache, FlagStyle, StateResponse, StatusLineChrome};
use geoclock::config::{default_config_path, parse_config, Config};
use geoclock::controller::{Controller, Intervals};
use geoclock::error::GeoclockError;
use geoclock::location::locale::locale_country;
use geoclock::location::store::load_stored;
use geoclock::location::{
    build_agent, default_state, HostLocale, JsonFileStore, KeyValueStore, LocationResolver, LocationState,
    SystemLocale,
};
use geoclock::server;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// geoclock: a status-bar clock that follows your IP-detected timezone.
///
/// Prints `<flag> <HH:MM> (<zone>)` to stdout whenever it changes, and
/// answers state queries on a local HTTP endpoint.
///
/// Examples:
///   geoclock
///   geoclock --config ~/.config/geoclock.toml run
///   geoclock once
///   geoclock query --watch
#[derive(Parser)]
#[command(name = "geoclock", version, about, long_about = None)]
struct Cli {
    /// Config file. Defaults to ~/.geoclock/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still wins).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Offline mode: skip the geolocation providers.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the clock (default).
    Run,
    /// Resolve the location once, persist it and print the state as JSON.
    Once,
    /// Ask a running clock for its state.
    Query {
        /// Keep polling once per second.
        #[arg(long, short = 'w')]
        watch: bool,

        /// Query endpoint address. Defaults to the configured one.
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), GeoclockError> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = parse_config(&config_path)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_clock(config, cli.offline))
        }
        Command::Once => run_once(config, cli.offline),
        Command::Query { watch, addr } => run_query(addr.unwrap_or(config.query_addr), watch),
    }
}

// ─── Wiring ─────────────────────────────────────────────────────

fn build_resolver(
    config: &Config,
    store: Arc<dyn KeyValueStore>,
    host: &dyn HostLocale,
    offline: bool,
) -> LocationResolver {
    let agent = build_agent(config.provider_timeout);
    let providers = config
        .providers
        .iter()
        .map(|kind| kind.build(agent.clone()))
        .collect();
    let mut resolver = LocationResolver::new(providers, store, config.failure_policy, locale_country(host));
    resolver.set_offline(offline);
    resolver
}

fn build_presenter(config: &Config) -> ClockPresenter {
    let chrome = StatusLineChrome::new(config.icon_dir.clone());
    let presenter = ClockPresenter::new(Box::new(chrome), &config.flag_cdn)
        .with_badge_colors(config.badge_background, config.badge_text_color);
    match config.flag_style {
        FlagStyle::Glyph => presenter,
        FlagStyle::Image => {
            let source = CdnFlagSource::new(build_agent(config.provider_timeout), &config.flag_cdn);
            presenter.with_flag_images(FlagImageCache::new(Box::new(source)))
        }
    }
}

/// Stored state merged over locale defaults, and whether this is the first run.
fn load_initial(store: &dyn KeyValueStore, host: &dyn HostLocale) -> Result<(LocationState, bool), GeoclockError> {
    let defaults = default_state(host);
    Ok(match load_stored(store)? {
        Some(stored) => (defaults.merge_stored(stored), false),
        None => (defaults, true),
    })
}

// ─── Commands ───────────────────────────────────────────────────

async fn run_clock(config: Config, offline: bool) -> Result<(), GeoclockError> {
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(config.storage_path.clone()));
    let host = SystemLocale::new(config.locale.clone());
    let (initial, first_run) = load_initial(store.as_ref(), &host)?;
    info!(
        "starting in {} / {} (storage: {})",
        initial.time_zone.name(),
        initial.country_code,
        config.storage_path.display()
    );

    let intervals = Intervals {
        render: config.render_interval,
        resolve: config.resolve_interval,
    };
    let controller = Controller::new(
        initial,
        build_resolver(&config, store, &host, offline),
        build_presenter(&config),
        intervals,
    );

    if first_run {
        controller.on_install().await;
    } else {
        controller.on_start().await;
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl+c: {}", e);
        }
    };
    let result = server::serve(config.query_addr, controller.clone(), shutdown).await;
    info!("shutting down");
    controller.shutdown();
    result
}

fn run_once(config: Config, offline: bool) -> Result<(), GeoclockError> {
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(config.storage_path.clone()));
    let host = SystemLocale::new(config.locale.clone());
    let (initial, _) = load_initial(store.as_ref(), &host)?;

    let resolver = build_resolver(&config, store, &host, offline);
    let state = resolver.resolve(&initial);

    let snapshot = build_presenter(&config).snapshot(&state, Utc::now());
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn run_query(addr: SocketAddr, watch: bool) -> Result<(), GeoclockError> {
    let agent = build_agent(Duration::from_secs(2));
    let url = format!("http://{}/api/message", addr);

    loop {
        match query_once(&agent, &url) {
            Ok(state) => println!("{} {} {}", state.flag, state.time, state.time_zone),
            Err(e) if watch => warn!("{}", e),
            Err(e) => return Err(e),
        }
        if !watch {
            return Ok(());
        }
        std::thread::sleep(Duration::from_secs(1));
    }
}

fn query_once(agent: &ureq::Agent, url: &str) -> Result<StateResponse, GeoclockError> {
    let response = agent
        .post(url)
        .send_json(serde_json::json!({ "type": "get-state" }))
        .map_err(|e| GeoclockError::Query(e.to_string()))?;
    Ok(response.into_json()?)
}
